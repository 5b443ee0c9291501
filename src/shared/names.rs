pub const MAX_PLAYER_NAME_LENGTH: usize = 20;

/// Trims surrounding whitespace and truncates to the display limit. Names that
/// are empty after trimming are rejected.
pub fn sanitize_player_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_PLAYER_NAME_LENGTH).collect())
}
