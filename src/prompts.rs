/// Instruction sent as the leading system message of every chat request.
pub const BASE_PROMPT: &str = include_str!("../data/prompts/base_prompt.txt");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_prompt_is_non_empty() {
        assert!(!BASE_PROMPT.trim().is_empty());
    }

    #[test]
    fn test_base_prompt_describes_revised_prompt_section() {
        assert!(BASE_PROMPT.contains("Revised prompt"));
    }
}
