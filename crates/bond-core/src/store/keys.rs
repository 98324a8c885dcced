//! Deterministic key templates for every artifact the system touches.

/// Prefix under which transcripts and engine output live
pub const TRANSCRIPTS_PREFIX: &str = "transcripts/";

pub fn profile(id: &str) -> String {
    format!("profiles/{}/profile.json", id)
}

pub fn vector(id: &str) -> String {
    format!("profiles/{}/vector.json", id)
}

pub fn transcript_text(base: &str) -> String {
    format!("{}{}.txt", TRANSCRIPTS_PREFIX, base)
}

pub fn transcript_json(base: &str) -> String {
    format!("{}{}.json", TRANSCRIPTS_PREFIX, base)
}

/// Folder the engine writes one job's output into
pub fn job_prefix(job: &str) -> String {
    format!("{}{}/", TRANSCRIPTS_PREFIX, job)
}

pub fn job_output(job: &str, file: &str) -> String {
    format!("{}{}.json", job_prefix(job), file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_templates() {
        assert_eq!(profile("alice"), "profiles/alice/profile.json");
        assert_eq!(vector("alice"), "profiles/alice/vector.json");
        assert_eq!(transcript_text("Alice"), "transcripts/Alice.txt");
        assert_eq!(transcript_json("Alice"), "transcripts/Alice.json");
        assert_eq!(job_output("mp3-abc", "mp3-abc"), "transcripts/mp3-abc/mp3-abc.json");
    }
}
