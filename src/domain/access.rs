use uuid::Uuid;

use crate::middleware::auth::{Principal, Role};

/// Ownership facts about an order used for authorization.
///
/// `farm_owner` is only looked up when the cheaper checks fail, so it is `None` both for
/// "not loaded" and "farm has no owner".
#[derive(Debug, Clone, Copy)]
pub struct OrderParties {
    pub buyer_id: Uuid,
    pub farm_id: Uuid,
    pub farmer_id: Option<Uuid>,
}

impl OrderParties {
    pub fn is_buyer(&self, principal: &Principal) -> bool {
        self.buyer_id == principal.user_id
    }

    pub fn is_denormalized_farmer(&self, principal: &Principal) -> bool {
        self.farmer_id == Some(principal.user_id)
    }

    pub fn is_same_farm(&self, principal: &Principal) -> bool {
        principal.farm_id == Some(self.farm_id)
    }

    /// Admin, recorded farmer, or a session bound to the order's farm.
    /// When this is false callers fall back to the farm's current owner.
    pub fn is_farm_side(&self, principal: &Principal) -> bool {
        principal.is_admin() || self.is_denormalized_farmer(principal) || self.is_same_farm(principal)
    }

    /// Farmers allowed to issue a new delivery code.
    pub fn is_assigned_farmer(&self, principal: &Principal) -> bool {
        principal.role == Role::Farmer
            && (self.is_same_farm(principal) || self.is_denormalized_farmer(principal))
    }
}

pub fn owns_farm(principal: &Principal, farm_owner: Option<Uuid>) -> bool {
    farm_owner == Some(principal.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role, farm_id: Option<Uuid>) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            role,
            farm_id,
        }
    }

    #[test]
    fn farm_side_access_paths() {
        let farm_id = Uuid::new_v4();
        let farmer = principal(Role::Farmer, None);
        let parties = OrderParties {
            buyer_id: Uuid::new_v4(),
            farm_id,
            farmer_id: Some(farmer.user_id),
        };

        assert!(parties.is_farm_side(&farmer));
        assert!(parties.is_farm_side(&principal(Role::Admin, None)));
        assert!(parties.is_farm_side(&principal(Role::Farmer, Some(farm_id))));
        assert!(!parties.is_farm_side(&principal(Role::Farmer, Some(Uuid::new_v4()))));
        assert!(!parties.is_farm_side(&principal(Role::Buyer, None)));
    }

    #[test]
    fn buyer_is_not_farm_side() {
        let buyer = principal(Role::Buyer, None);
        let parties = OrderParties {
            buyer_id: buyer.user_id,
            farm_id: Uuid::new_v4(),
            farmer_id: None,
        };
        assert!(parties.is_buyer(&buyer));
        assert!(!parties.is_farm_side(&buyer));
    }

    #[test]
    fn only_farmers_are_assigned() {
        let farm_id = Uuid::new_v4();
        let parties = OrderParties {
            buyer_id: Uuid::new_v4(),
            farm_id,
            farmer_id: None,
        };
        assert!(parties.is_assigned_farmer(&principal(Role::Farmer, Some(farm_id))));
        assert!(!parties.is_assigned_farmer(&principal(Role::Admin, Some(farm_id))));
    }

    #[test]
    fn farm_owner_fallback() {
        let owner = principal(Role::Farmer, None);
        assert!(owns_farm(&owner, Some(owner.user_id)));
        assert!(!owns_farm(&owner, Some(Uuid::new_v4())));
        assert!(!owns_farm(&owner, None));
    }
}
