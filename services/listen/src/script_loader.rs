use anyhow::{Context, Result};
use listen_types::BackendEvent;
use std::fs;
use std::path::{Path, PathBuf};

/// Loads a recorded backend stream.
///
/// `path` is either one JSON-lines file or a directory whose `*.jsonl` files
/// are concatenated in file-name order. Blank lines are skipped.
pub fn load_script(path: &Path) -> Result<Vec<BackendEvent>> {
    let files = if path.is_dir() {
        script_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut events = Vec::new();
    for file in files {
        let content =
            fs::read_to_string(&file).with_context(|| format!("Failed to read script file: {}", file.display()))?;
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let event: BackendEvent = serde_json::from_str(line)
                .with_context(|| format!("Invalid backend event at {}:{}", file.display(), index + 1))?;
            events.push(event);
        }
    }
    Ok(events)
}

fn script_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read script directory: {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_single_file() -> Result<()> {
        // 1. Arrange: one script with a blank line in the middle.
        let dir = tempdir()?;
        let path = dir.path().join("lesson.jsonl");
        let mut file = File::create(&path)?;
        writeln!(file, r#"{{"type":"content","generated_block_bid":"b1","content":"Hello"}}"#)?;
        writeln!(file)?;
        writeln!(file, r#"{{"type":"done"}}"#)?;

        // 2. Act
        let events = load_script(&path)?;

        // 3. Assert
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "content");
        assert_eq!(events[0].text(), Some("Hello"));
        assert_eq!(events[1].event_type, "done");
        assert!(events[1].generated_block_bid.is_none());
        Ok(())
    }

    #[test]
    fn test_load_directory_in_name_order() -> Result<()> {
        let dir = tempdir()?;
        let mut second = File::create(dir.path().join("02.jsonl"))?;
        writeln!(second, r#"{{"type":"done"}}"#)?;
        let mut first = File::create(dir.path().join("01.jsonl"))?;
        writeln!(first, r#"{{"type":"content","content":"First"}}"#)?;

        // Files that are not scripts are ignored, as are subdirectories.
        let mut notes = File::create(dir.path().join("notes.txt"))?;
        writeln!(notes, "not json")?;
        fs::create_dir(dir.path().join("nested.jsonl"))?;

        let events = load_script(dir.path())?;
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["content", "done"]);
        Ok(())
    }

    #[test]
    fn test_malformed_line_reports_location() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.jsonl");
        let mut file = File::create(&path)?;
        writeln!(file, r#"{{"type":"done"}}"#)?;
        writeln!(file, "{{not json")?;

        let err = load_script(&path).unwrap_err();
        assert!(err.to_string().contains("broken.jsonl:2"));
        Ok(())
    }

    #[test]
    fn test_load_from_nonexistent_path() {
        let result = load_script(Path::new("nonexistent_script_for_testing.jsonl"));
        assert!(result.is_err());
    }
}
