//! Reading passages from input files.

use std::path::Path;

/// Split text into blank-line separated passages.
///
/// Lines inside a passage are joined with single spaces.
pub fn split_passages(text: &str) -> Vec<String> {
    let mut passages = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                passages.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        passages.push(current.join(" "));
    }
    passages
}

/// Read and split every file, or stdin for `-`.
pub fn read_passages(paths: &[String]) -> anyhow::Result<Vec<String>> {
    let mut passages = Vec::new();
    for path in paths {
        let text = if path == "-" {
            std::io::read_to_string(std::io::stdin())?
        } else {
            std::fs::read_to_string(Path::new(path))
                .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path, e))?
        };
        passages.extend(split_passages(&text));
    }
    Ok(passages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_passages() {
        let text = "Acme Corp makes rockets.\nIn Ohio.\n\n\n  Bob joined Acme.  \n";
        assert_eq!(
            split_passages(text),
            vec!["Acme Corp makes rockets. In Ohio.", "Bob joined Acme."]
        );
        assert!(split_passages("\n \n").is_empty());
    }

    #[test]
    fn test_read_passages_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "one\n\ntwo").unwrap();
        std::fs::write(&b, "three").unwrap();
        let paths = vec![a.display().to_string(), b.display().to_string()];
        assert_eq!(read_passages(&paths).unwrap(), vec!["one", "two", "three"]);
        assert!(read_passages(&["/nonexistent/file.txt".to_string()]).is_err());
    }
}
