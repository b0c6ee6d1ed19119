use crate::domain::UserId;

/// Identity gate: the allow-set is loaded once at startup and a principal
/// is either in it or not. An empty allow-set denies everyone.
pub fn is_authorized(user_id: Option<UserId>, allowed_users: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    if allowed_users.is_empty() {
        return false;
    }
    allowed_users.contains(&user_id.0)
}
