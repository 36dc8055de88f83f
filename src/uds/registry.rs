//! In-memory table of registered users.

use super::error::ResultCode;

/// Reserved user index meaning "no user"
pub const USER_INDEX_UNKNOWN: u8 = 0xFF;

pub const MAX_CONSENT_CODE: u16 = 9999;

/// Stored in place of a consent code so no request can ever match it
const INVALID_CONSENT_CODE: u16 = MAX_CONSENT_CODE + 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UserRecord {
    pub index: u8,
    pub consent_code: u16,
    pub height: u16,
    pub weight: u16,
}

impl UserRecord {
    pub const INVALID: Self = Self {
        index: USER_INDEX_UNKNOWN,
        consent_code: INVALID_CONSENT_CODE,
        height: 0,
        weight: 0,
    };

    pub fn is_valid(&self) -> bool {
        self.index != USER_INDEX_UNKNOWN && self.consent_code <= MAX_CONSENT_CODE
    }
}

/// Up to `N` users at indices `1..=N`.
///
/// The active user is the one the height and weight characteristics and
/// Delete User Data act on. Registering a user makes it active; consent
/// switches to the consenting user.
#[derive(Debug)]
pub struct UserRegistry<const N: usize> {
    users: [UserRecord; N],
    count: u8,
    active: u8,
    multiple_users: bool,
}

impl<const N: usize> UserRegistry<N> {
    pub fn new(multiple_users: bool) -> Self {
        debug_assert!(N >= 1, "the registry needs room for one user");

        Self {
            users: [UserRecord::INVALID; N],
            count: 0,
            active: USER_INDEX_UNKNOWN,
            multiple_users,
        }
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    /// Record at `index`, valid or not
    pub fn get(&self, index: u8) -> Option<&UserRecord> {
        Self::slot(index).and_then(|slot| self.users.get(slot))
    }

    pub fn active(&self) -> Option<&UserRecord> {
        self.get(self.active).filter(|user| user.is_valid())
    }

    pub fn active_mut(&mut self) -> Option<&mut UserRecord> {
        let slot = Self::slot(self.active)?;
        self.users.get_mut(slot).filter(|user| user.is_valid())
    }

    /// Make the valid user at `index` the active one.
    pub fn select(&mut self, index: u8) -> Option<&UserRecord> {
        if !self.get(index).is_some_and(|user| user.is_valid()) {
            return None;
        }

        self.active = index;
        self.active()
    }

    /// Store a new user and return its index.
    ///
    /// The consent code must already be in range.
    pub fn register(&mut self, consent_code: u16) -> Result<u8, ResultCode> {
        debug_assert!(consent_code <= MAX_CONSENT_CODE);

        let index = if self.multiple_users {
            self.count.saturating_add(1)
        } else {
            1
        };

        if self.get(index).is_some_and(|user| user.is_valid()) {
            // Slot taken
            return Err(ResultCode::OperationFailed);
        }

        let Some(slot) = Self::slot(index).filter(|slot| *slot < N) else {
            // Index space exhausted
            return Err(ResultCode::OperationFailed);
        };

        self.users[slot] = UserRecord {
            index,
            consent_code,
            height: 0,
            weight: 0,
        };
        self.count = index;
        self.active = index;

        if self.multiple_users {
            if let Some(next) = self.users.get_mut(slot + 1) {
                *next = UserRecord::INVALID;
            }
        }

        Ok(index)
    }

    /// Invalidate the active user. No user is active afterwards.
    pub fn delete_active(&mut self) -> Result<(), ResultCode> {
        let slot = Self::slot(self.active)
            .filter(|slot| self.users.get(*slot).is_some_and(|user| user.is_valid()))
            .ok_or(ResultCode::UserNotAuthorized)?;

        self.users[slot] = UserRecord::INVALID;
        self.count = self.count.saturating_sub(1);
        self.active = USER_INDEX_UNKNOWN;
        Ok(())
    }

    /// Forget every user.
    pub fn clear(&mut self) {
        self.users = [UserRecord::INVALID; N];
        self.count = 0;
        self.active = USER_INDEX_UNKNOWN;
    }

    fn slot(index: u8) -> Option<usize> {
        match index {
            0 | USER_INDEX_UNKNOWN => None,
            index => Some(index as usize - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_user_always_registers_at_index_one() {
        let mut registry = UserRegistry::<1>::new(false);

        assert_eq!(registry.register(1234), Ok(1));
        assert_eq!(registry.active().map(|user| user.consent_code), Some(1234));
        assert_eq!(registry.register(42), Err(ResultCode::OperationFailed));

        registry.delete_active().unwrap();
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.register(42), Ok(1));
    }

    #[test]
    fn test_multiple_users_get_increasing_indices() {
        let mut registry = UserRegistry::<3>::new(true);

        assert_eq!(registry.register(1), Ok(1));
        assert_eq!(registry.register(2), Ok(2));
        assert_eq!(registry.register(3), Ok(3));
        // Index space exhausted
        assert_eq!(registry.register(4), Err(ResultCode::OperationFailed));

        assert_eq!(registry.active().map(|user| user.index), Some(3));
        assert_eq!(registry.get(2).map(|user| user.consent_code), Some(2));
    }

    #[test]
    fn test_delete_invalidates_the_record() {
        let mut registry = UserRegistry::<1>::new(false);
        registry.register(7).unwrap();
        if let Some(user) = registry.active_mut() {
            user.height = 170;
        }

        registry.delete_active().unwrap();

        assert_eq!(registry.get(1), Some(&UserRecord::INVALID));
        assert!(registry.active().is_none());
        assert_eq!(
            registry.delete_active(),
            Err(ResultCode::UserNotAuthorized)
        );
    }

    #[test]
    fn test_select_switches_the_active_user() {
        let mut registry = UserRegistry::<3>::new(true);
        registry.register(1).unwrap();
        registry.register(2).unwrap();

        assert_eq!(registry.select(1).map(|user| user.consent_code), Some(1));
        if let Some(user) = registry.active_mut() {
            user.weight = 80;
        }
        assert_eq!(registry.get(1).map(|user| user.weight), Some(80));
        assert_eq!(registry.get(2).map(|user| user.weight), Some(0));

        // Invalid slots cannot be selected
        assert!(registry.select(3).is_none());
        assert_eq!(registry.active().map(|user| user.index), Some(1));

        registry.delete_active().unwrap();
        assert!(registry.active().is_none());
        assert_eq!(registry.get(2).map(|user| user.consent_code), Some(2));
    }

    #[test]
    fn test_reserved_indices_have_no_record() {
        let registry = UserRegistry::<2>::new(true);
        assert!(registry.get(0).is_none());
        assert!(registry.get(USER_INDEX_UNKNOWN).is_none());
        assert!(registry.get(3).is_none());
    }

    #[test]
    fn test_clear_forgets_everyone() {
        let mut registry = UserRegistry::<2>::new(true);
        registry.register(1).unwrap();
        registry.register(2).unwrap();

        registry.clear();

        assert_eq!(registry.count(), 0);
        assert_eq!(registry.register(5), Ok(1));
    }
}
