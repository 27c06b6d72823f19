//! Training corpus store
//!
//! Append-only CSV file of labeled examples, one `text,label` pair per line.
//! Free text is normalized by stripping (not escaping) characters that would
//! break the two-field layout, so existing corpus files stay readable by any
//! tool that splits on the first comma.
//!
//! The file modification time is the change signal for the training trigger.

use nlcm_common::time::{self, EpochSeconds};
use nlcm_common::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Field delimiter
pub const DELIMITER: char = ',';

/// Record terminator written after each example
pub const LINE_ENDING: &str = "\r\n";

/// Characters removed from example text before appending
const STRIPPED_FROM_TEXT: &[char] = &[DELIMITER, '?', '!', '.', '\r', '\n'];

/// Characters removed from labels before appending
const STRIPPED_FROM_LABEL: &[char] = &[DELIMITER, '\r', '\n'];

/// Strip delimiter, terminators and sentence punctuation from example text
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !STRIPPED_FROM_TEXT.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Strip delimiter and terminators from a label
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !STRIPPED_FROM_LABEL.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Local labeled-example store for one classifier family
#[derive(Debug)]
pub struct TrainingCorpus {
    path: PathBuf,
    language: String,
    write_lock: Mutex<()>,
}

impl TrainingCorpus {
    pub fn new(path: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language: language.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Locale tag passed opaquely to training
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Whether the corpus file exists yet
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Last modification time, `None` if the corpus file does not exist
    pub fn last_modified(&self) -> Result<Option<EpochSeconds>> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(time::system_time_to_epoch(meta.modified()?))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Append one labeled example
    ///
    /// Creates the file (and parent directories) on first use. If the existing
    /// file does not end with a line break, one is written first so the new
    /// example always starts on its own line.
    pub fn append(&self, text: &str, label: &str) -> Result<()> {
        let text = normalize_text(text);
        let label = normalize_label(label);

        if text.is_empty() {
            return Err(Error::InvalidInput(
                "Example text is empty after normalization".to_string(),
            ));
        }
        if label.is_empty() {
            return Err(Error::InvalidInput(
                "Example label is empty after normalization".to_string(),
            ));
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::Internal("Corpus write lock poisoned".to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut line = String::new();
        if !ends_with_line_break(&mut file)? {
            line.push_str(LINE_ENDING);
        }
        line.push_str(&text);
        line.push(DELIMITER);
        line.push_str(&label);
        line.push_str(LINE_ENDING);

        file.write_all(line.as_bytes())?;
        file.flush()?;

        info!("Appended training example for class {} to {}", label, self.path.display());
        Ok(())
    }

    /// Number of non-empty lines (examples) in the corpus
    pub fn example_count(&self) -> Result<usize> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().filter(|l| !l.trim().is_empty()).count()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

/// True for empty files and files whose last byte is `\n`
fn ends_with_line_break(file: &mut fs::File) -> Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }

    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    debug!("Corpus last byte: {:#04x}", last[0]);
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn corpus_in(dir: &TempDir) -> TrainingCorpus {
        TrainingCorpus::new(dir.path().join("shared").join("self_nlc.csv"), "en")
    }

    #[test]
    fn test_normalize_text_strips_not_escapes() {
        assert_eq!(normalize_text("Hello, world! How are you?"), "Hello world How are you");
        assert_eq!(normalize_text("line\r\nbreak."), "linebreak");
        assert_eq!(normalize_text("  \"quoted\"  "), "\"quoted\"");
    }

    #[test]
    fn test_normalize_label_keeps_punctuation_other_than_delimiter() {
        assert_eq!(normalize_label("greeting.hello"), "greeting.hello");
        assert_eq!(normalize_label("a,b\n"), "ab");
    }

    #[test]
    fn test_missing_corpus_has_no_mtime_and_no_examples() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus_in(&dir);

        assert!(!corpus.exists());
        assert_eq!(corpus.last_modified().unwrap(), None);
        assert_eq!(corpus.example_count().unwrap(), 0);
    }

    #[test]
    fn test_append_creates_file_lazily() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus_in(&dir);

        corpus.append("What time is it?", "time").unwrap();

        assert!(corpus.exists());
        assert!(corpus.last_modified().unwrap().is_some());
        let content = fs::read_to_string(corpus.path()).unwrap();
        assert_eq!(content, "What time is it,time\r\n");
    }

    #[test]
    fn test_every_line_has_exactly_two_fields() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus_in(&dir);

        corpus.append("one, two, three", "count").unwrap();
        corpus.append("multi\nline\ntext", "lines,weird").unwrap();

        let content = fs::read_to_string(corpus.path()).unwrap();
        for line in content.lines() {
            assert_eq!(line.split(DELIMITER).count(), 2, "bad line: {:?}", line);
        }
        assert_eq!(corpus.example_count().unwrap(), 2);
    }

    #[test]
    fn test_append_terminates_unterminated_last_line() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus_in(&dir);
        fs::create_dir_all(corpus.path().parent().unwrap()).unwrap();
        fs::write(corpus.path(), "hello there,greeting").unwrap();

        corpus.append("goodbye", "farewell").unwrap();

        let content = fs::read_to_string(corpus.path()).unwrap();
        assert_eq!(content, "hello there,greeting\r\ngoodbye,farewell\r\n");
    }

    #[test]
    fn test_append_never_rewrites_existing_content() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus_in(&dir);
        fs::create_dir_all(corpus.path().parent().unwrap()).unwrap();
        fs::write(corpus.path(), "keep me,exactly\r\n").unwrap();

        corpus.append("new", "example").unwrap();

        let content = fs::read_to_string(corpus.path()).unwrap();
        assert!(content.starts_with("keep me,exactly\r\n"));
    }

    #[test]
    fn test_empty_text_or_label_rejected() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus_in(&dir);

        assert!(matches!(corpus.append("?!.", "label"), Err(Error::InvalidInput(_))));
        assert!(matches!(corpus.append("text", ",\n"), Err(Error::InvalidInput(_))));
        assert!(!corpus.exists(), "rejected appends must not create the file");
    }

    #[test]
    fn test_language_is_opaque() {
        let corpus = TrainingCorpus::new("x.csv", "pt-br");
        assert_eq!(corpus.language(), "pt-br");
    }
}
