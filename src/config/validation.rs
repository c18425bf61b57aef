const MAX_REPOSITORY_NAME_LEN: usize = 64;

fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
}

/// Repository names double as the first segment of route paths.
pub fn validate_repository_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Repository name cannot be empty".to_string());
    }
    if name.len() > MAX_REPOSITORY_NAME_LEN {
        return Err(format!(
            "Repository name cannot exceed {MAX_REPOSITORY_NAME_LEN} characters"
        ));
    }
    if !name.chars().all(is_valid_name_char) {
        return Err(
            "Repository name can only contain alphanumeric characters, hyphens, underscores, and periods"
                .to_string(),
        );
    }
    if name.starts_with('.') {
        return Err("Repository name cannot start with a period".to_string());
    }
    Ok(())
}
