use crate::State;
use std::fmt::{Display, Formatter};

impl State {
    pub fn new(values: Vec<bool>) -> State {
        State(values)
    }

    /// Parse a state from a `0/1` string, e.g. `"101"`.
    pub fn try_from_bits(bits: &str) -> Result<State, String> {
        bits.chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                _ => Err(format!("Invalid state character `{}` in `{}`.", c, bits)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(State)
    }

    pub fn values(&self) -> &[bool] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of the node at the given position of the model node list.
    pub fn get(&self, node: usize) -> bool {
        self.0[node]
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for value in &self.0 {
            write!(f, "{}", if *value { '1' } else { '0' })?;
        }
        Ok(())
    }
}
