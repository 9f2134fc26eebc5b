use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Profile editing --

/// Partial profile edit. `None` leaves a field untouched. For the optional
/// `bio` and `location`, `Some("")` clears the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.image_url.is_none()
            && self.header_image_url.is_none()
            && self.bio.is_none()
            && self.location.is_none()
    }
}

// -- Likes --

#[derive(Debug, Serialize)]
pub struct ToggleLikeResponse {
    pub message_id: Uuid,
    pub liked: bool,
}
