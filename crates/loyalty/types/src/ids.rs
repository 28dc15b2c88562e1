use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// A loyalty program member.
    CustomerId
);
uuid_id!(
    /// The restaurant that owns a ledger.
    RestaurantId
);
uuid_id!(
    /// A reward catalog entry.
    RewardId
);
uuid_id!(
    /// An earn event (purchase transaction).
    TransactionId
);
uuid_id!(
    /// A spend event (redemption).
    RedemptionId
);
uuid_id!(
    /// A staff member verifying redemptions.
    StaffId
);

/// The staff-facing redemption lookup token.
///
/// Unique per restaurant; printed on the customer's redemption screen and
/// typed or scanned by staff at the counter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RedemptionCode(pub String);

impl RedemptionCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RedemptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
