use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use mrqa_core::{null_fields, FieldMap, DCM_PATH};

use crate::error::{ReaderError, Result};
use crate::taglist::TagList;
use crate::tsv::parse_line;

/// Turns a file into header fields.
///
/// Never fails: an unreadable file yields every known field set to the
/// sentinel, plus the `dcm_path` echo.
#[async_trait]
pub trait FieldReader: Send + Sync {
    async fn read(&self, path: &Path) -> FieldMap;
}

/// Runs an external header-dump command (`<command> <path>`) and parses the
/// first line it prints.
#[derive(Debug, Clone)]
pub struct HeaderDumpReader {
    command: String,
    tags: TagList,
    timeout: Duration,
}

impl HeaderDumpReader {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(command: impl Into<String>, tags: TagList) -> Self {
        Self {
            command: command.into(),
            tags,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tags(&self) -> &TagList {
        &self.tags
    }

    async fn try_read(&self, path: &Path) -> Result<FieldMap> {
        let fail = |reason: String| ReaderError::Command {
            command: self.command.clone(),
            reason,
        };

        let child = Command::new(&self.command)
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| fail(format!("spawn: {e}")))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| fail(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| fail(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!("exit {}: {}", output.status, stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| fail("no output".to_string()))?;
        let mut fields = parse_line(&self.tags, line)?;
        fields
            .entry(DCM_PATH.to_string())
            .or_insert_with(|| path.display().to_string());
        Ok(fields)
    }
}

#[async_trait]
impl FieldReader for HeaderDumpReader {
    async fn read(&self, path: &Path) -> FieldMap {
        match self.try_read(path).await {
            Ok(fields) => {
                debug!(path = %path.display(), "header read");
                fields
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read header, using null values");
                null_fields(
                    self.tags.names().iter().map(String::as_str),
                    &path.display().to_string(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrqa_core::NULL_VALUE;

    #[tokio::test]
    async fn missing_command_degrades_to_sentinels() {
        let reader = HeaderDumpReader::new("/nonexistent/header-dump", TagList::default());
        let fields = reader.read(Path::new("/tmp/MR.1")).await;
        assert_eq!(fields["TR"], NULL_VALUE);
        assert_eq!(fields["Station"], NULL_VALUE);
        assert_eq!(fields[DCM_PATH], "/tmp/MR.1");
        assert_eq!(fields.len(), TagList::default().len() + 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_output_is_parsed_in_tag_order() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("dump.sh");
        let mut f = std::fs::File::create(&script).unwrap();
        writeln!(f, "#!/bin/sh\nprintf 'p2\\t1300.0\\t%s\\n' \"$1\"").unwrap();
        drop(f);
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let tags = TagList::parse("iPAT\tx\nTR\t0018,0080\n").unwrap();
        let reader = HeaderDumpReader::new(script.display().to_string(), tags);
        let fields = reader.read(Path::new("a/MR.2")).await;
        assert_eq!(fields["iPAT"], "p2");
        assert_eq!(fields["TR"], "1300.0");
        assert_eq!(fields[DCM_PATH], "a/MR.2");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_degrades_to_sentinels() {
        let reader = HeaderDumpReader::new("false", TagList::default());
        let fields = reader.read(Path::new("x.dcm")).await;
        assert!(fields
            .iter()
            .filter(|(k, _)| k.as_str() != DCM_PATH)
            .all(|(_, v)| v == NULL_VALUE));
    }
}
