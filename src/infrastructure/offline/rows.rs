use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct SubmissionRow {
    pub id: String,
    pub campaign_id: Option<String>,
    pub location_id: Option<String>,
    pub community_group_id: Option<String>,
    pub community_group_type: String,
    pub participant_count: i64,
    pub key_issues: String,
    pub photo_proof: String,
    pub status: String,
    pub sync_status: String,
    pub submitted_by: String,
    pub submitted_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub attempt_count: i64,
    pub last_attempt_at: Option<i64>,
    pub last_error: Option<String>,
    pub last_error_kind: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ImageRow {
    pub id: String,
    pub data: Vec<u8>,
    pub content_type: String,
    pub byte_len: i64,
    pub sha256: String,
    pub created_at: i64,
}
