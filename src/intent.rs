// src/intent.rs

/// What a prompt is asking the model to do, as far as the merge/replace
/// policy cares. One seam for the keyword heuristic so the policy can be
/// swapped without touching the apply logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Modify,
    NewProject,
    TypeScriptConversion,
    Unknown,
}

const TYPESCRIPT_KEYWORDS: [&str; 3] = ["typescript", "ts", "convert to typescript"];
const NEW_PROJECT_KEYWORDS: [&str; 5] = ["create", "rewrite", "generate", "build", "new"];
const MODIFY_KEYWORDS: [&str; 3] = ["modify", "change", "update"];

/// Lowercased substring checks, TypeScript conversion winning over new-project
/// winning over modify. A heuristic, not a parser: "update the tests" reads
/// as a TypeScript request because of the "ts" fragment.
pub fn classify(prompt: &str) -> Intent {
    let prompt = prompt.to_lowercase();
    if TYPESCRIPT_KEYWORDS.iter().any(|k| prompt.contains(k)) {
        return Intent::TypeScriptConversion;
    }
    if NEW_PROJECT_KEYWORDS.iter().any(|k| prompt.contains(k)) {
        return Intent::NewProject;
    }
    if MODIFY_KEYWORDS.iter().any(|k| prompt.contains(k)) {
        return Intent::Modify;
    }
    Intent::Unknown
}

/// New projects and TypeScript conversions wipe the tree; everything else
/// merges into it.
pub fn replaces_tree(intent: Intent) -> bool {
    matches!(intent, Intent::NewProject | Intent::TypeScriptConversion)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_project_keywords() {
        assert_eq!(classify("make me an app, generate everything"), Intent::NewProject);
        assert_eq!(classify("rewrite the whole backend"), Intent::NewProject);
    }

    #[test]
    fn modify_keywords() {
        assert_eq!(classify("update the button color"), Intent::Modify);
        assert_eq!(classify("change the header"), Intent::Modify);
    }

    #[test]
    fn typescript_wins_over_everything() {
        assert_eq!(classify("convert to typescript"), Intent::TypeScriptConversion);
        assert_eq!(
            classify("create a typescript server"),
            Intent::TypeScriptConversion
        );
    }

    #[test]
    fn ts_fragment_is_greedy() {
        // Known quirk of the substring heuristic.
        assert_eq!(classify("update the tests"), Intent::TypeScriptConversion);
    }

    #[test]
    fn unmatched_prompts_are_unknown() {
        assert_eq!(classify("how does the login flow work?"), Intent::Unknown);
    }

    #[test]
    fn replace_policy() {
        assert!(replaces_tree(Intent::NewProject));
        assert!(replaces_tree(Intent::TypeScriptConversion));
        assert!(!replaces_tree(Intent::Modify));
        assert!(!replaces_tree(Intent::Unknown));
    }
}
