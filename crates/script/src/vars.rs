use novella_common::{RestoreError, Savable, SavableKind, StateBlob, VariablesState};

/// Story flags and counters of the current playthrough.
#[derive(Debug, Clone, Default)]
pub struct StoryVariables {
    state: VariablesState,
}

impl StoryVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.state.ints.get(key).copied()
    }

    pub fn set_int(&mut self, key: impl Into<String>, value: i64) {
        self.state.ints.insert(key.into(), value);
    }

    /// Add `delta` to an integer variable, starting from zero. Returns the new value.
    pub fn add_int(&mut self, key: impl Into<String>, delta: i64) -> i64 {
        let value = self.state.ints.entry(key.into()).or_insert(0);
        *value = value.saturating_add(delta);
        *value
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.state.strings.get(key).map(String::as_str)
    }

    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.state.strings.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let int = self.state.ints.remove(key).is_some();
        let string = self.state.strings.remove(key).is_some();
        int || string
    }

    pub fn clear(&mut self) {
        self.state = VariablesState::default();
    }

    pub fn is_empty(&self) -> bool {
        self.state.ints.is_empty() && self.state.strings.is_empty()
    }
}

impl Savable for StoryVariables {
    fn kind(&self) -> SavableKind {
        SavableKind::Variables
    }

    fn capture(&self) -> StateBlob {
        StateBlob::Variables(self.state.clone())
    }

    fn restore(&mut self, blob: StateBlob) -> Result<(), RestoreError> {
        match blob {
            StateBlob::Variables(state) => {
                self.state = state;
                Ok(())
            }
            other => Err(RestoreError::mismatch(SavableKind::Variables, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ints_and_strings() {
        let mut vars = StoryVariables::new();
        assert_eq!(vars.add_int("trust", 2), 2);
        assert_eq!(vars.add_int("trust", -5), -3);
        vars.set_string("route", "river");
        assert_eq!(vars.int("trust"), Some(-3));
        assert_eq!(vars.string("route"), Some("river"));
        assert!(vars.remove("route"));
        assert!(!vars.remove("route"));
    }

    #[test]
    fn capture_restore_replaces_everything() {
        let mut vars = StoryVariables::new();
        vars.set_int("a", 1);
        let blob = vars.capture();

        vars.set_int("a", 9);
        vars.set_string("b", "x");
        vars.restore(blob).unwrap();
        assert_eq!(vars.int("a"), Some(1));
        assert_eq!(vars.string("b"), None);
    }

    #[test]
    fn wrong_blob_is_rejected() {
        let mut vars = StoryVariables::new();
        vars.set_int("a", 1);
        assert!(vars.restore(StateBlob::Actors(Vec::new())).is_err());
        assert_eq!(vars.int("a"), Some(1));
    }
}
