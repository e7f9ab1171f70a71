//! Session history for hash addresses.

use super::routes::Address;

/// Address bar plus back stack.
///
/// `push` drops any forward entries, like a browser does after Back.
#[derive(Debug, Clone)]
pub struct Location {
    entries: Vec<Address>,
    index: usize,
}

impl Location {
    pub fn new(initial: Address) -> Self {
        Location {
            entries: vec![initial],
            index: 0,
        }
    }

    pub fn current(&self) -> &Address {
        &self.entries[self.index]
    }

    pub fn push(&mut self, address: Address) {
        self.entries.truncate(self.index + 1);
        self.entries.push(address);
        self.index = self.entries.len() - 1;
    }

    pub fn replace(&mut self, address: Address) {
        self.entries[self.index] = address;
    }

    /// Moves one entry back. Returns `false` at the start of history.
    pub fn back(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    pub fn can_go_back(&self) -> bool {
        self.index > 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Route;

    fn at(route: Route) -> Address {
        Address::new(route, Vec::new())
    }

    #[test]
    fn test_push_replace_back() {
        let mut location = Location::new(at(Route::Landing));
        location.push(at(Route::ParentLogin));
        location.replace(at(Route::ParentDashboard));
        assert_eq!(location.len(), 2);

        assert!(location.back());
        assert_eq!(location.current().route(), Some(Route::Landing));
        assert!(!location.back());
    }

    #[test]
    fn test_push_after_back_drops_forward_entries() {
        let mut location = Location::new(at(Route::Landing));
        location.push(at(Route::ParentLogin));
        location.push(at(Route::ParentDashboard));
        location.back();
        location.push(at(Route::ManageKids));

        assert_eq!(location.len(), 3);
        assert_eq!(location.current().route(), Some(Route::ManageKids));
        location.back();
        assert_eq!(location.current().route(), Some(Route::ParentLogin));
    }
}
