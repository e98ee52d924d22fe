use crate::typedid::{TypedId, TypedIdMarker};

/// Users are owned by the upstream identity service; this crate only sees
/// their ids, either in project memberships or in the caller headers.
pub type UserId = TypedId<User>;

#[derive(Clone, Debug)]
pub struct User;

impl TypedIdMarker for User {
    fn tag() -> &'static str {
        "USR"
    }
}
