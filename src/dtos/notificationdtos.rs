use serde::Deserialize;

//Notification DTOs
#[derive(Debug, Deserialize)]
pub struct FilterNotificationsDto {
    pub unread_only: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<usize>,
}
