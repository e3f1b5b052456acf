use crate::config::resolve_against;
use crate::logging::LogLevel;
use crate::messages::MessageOrchestrator;
use crate::messages::taxonomy::{domain, file as events};
use crate::models::{FileConfig, FileMeta, FileOutput};
use crate::services::FileManager;
use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::json;
use std::sync::Arc;

/// Input file intake: discovery, archival copy and loading.
#[derive(Debug)]
pub struct FileOrchestrator {
    config: FileConfig,
    files: FileManager,
    data_dir: Utf8PathBuf,
    in_dir: Utf8PathBuf,
    out_dir: Utf8PathBuf,
    messages: Arc<MessageOrchestrator>,
}

impl FileOrchestrator {
    /// Resolve and create the input and output directories.
    ///
    /// `data_dir` resolves against `project_root`; `in_dir` and `out_dir`
    /// resolve against `data_dir`.
    pub fn new(
        config: &FileConfig,
        project_root: &Utf8Path,
        messages: Arc<MessageOrchestrator>,
    ) -> Result<Self> {
        let files = FileManager::new();
        let data_dir = resolve_against(project_root, &config.data_dir);
        let in_dir = files.ensure_dir(&resolve_against(&data_dir, &config.in_dir))?;
        let out_dir = files.ensure_dir(&resolve_against(&data_dir, &config.out_dir))?;

        messages.emit(
            domain::FILE,
            events::INIT,
            LogLevel::Info,
            json!({"in_dir": in_dir, "out_dir": out_dir}),
        );

        Ok(Self {
            config: config.clone(),
            files,
            data_dir,
            in_dir,
            out_dir,
            messages,
        })
    }

    pub fn in_dir(&self) -> &Utf8Path {
        &self.in_dir
    }

    pub fn out_dir(&self) -> &Utf8Path {
        &self.out_dir
    }

    pub fn meta(&self) -> FileMeta {
        FileMeta {
            data_dir: self.data_dir.clone(),
            in_dir: self.in_dir.clone(),
            out_dir: self.out_dir.clone(),
            extensions: self.config.extensions.clone(),
        }
    }

    /// First matching file in sorted order, if any.
    pub fn pick_input_file(&self) -> Result<Option<Utf8PathBuf>> {
        let candidates = self
            .files
            .list_files_by_ext(&self.in_dir, &self.config.extensions)?;
        if candidates.len() > 1 {
            tracing::debug!(
                "{} candidate input files, using {}",
                candidates.len(),
                candidates[0]
            );
        }
        Ok(candidates.into_iter().next())
    }

    /// Pick, archive and load the input file.
    ///
    /// The timestamped copy lands in `out_dir`. With compression enabled the
    /// copy is gzipped, and the uncompressed copy is removed only after
    /// compression succeeded and `delete_uncompressed` is set.
    pub fn process_input(&self) -> Result<FileOutput> {
        let Some(file) = self.pick_input_file()? else {
            self.messages.emit(
                domain::FILE,
                events::NO_INPUT_FILE,
                LogLevel::Warn,
                json!({"in_dir": self.in_dir, "extensions": self.config.extensions}),
            );
            return Ok(FileOutput {
                found: false,
                file: None,
                saved_copy: None,
                saved_copy_compressed: None,
                data: None,
                meta: self.meta(),
            });
        };

        self.messages.emit(
            domain::FILE,
            events::INPUT_FOUND,
            LogLevel::Info,
            json!({"file": file}),
        );

        let data = self.files.read_file(&file)?;

        let mut saved_copy = None;
        let mut saved_copy_compressed = None;
        if self.config.save_input_file {
            let name = self.files.make_timestamp_name(&file);
            let copy = self.files.copy_file(&file, &self.out_dir, Some(&name))?;
            if self.config.save_input_file_compression {
                saved_copy_compressed =
                    Some(self.files.compress_file_gz(&copy, self.config.delete_uncompressed)?);
                if !self.config.delete_uncompressed {
                    saved_copy = Some(copy);
                }
            } else {
                saved_copy = Some(copy);
            }
        }

        let (rows, cols) = data.shape();
        self.messages.emit(
            domain::FILE,
            events::INPUT_PROCESSED,
            LogLevel::Info,
            json!({
                "file": file,
                "rows": rows,
                "cols": cols,
                "saved_copy": saved_copy,
                "saved_copy_compressed": saved_copy_compressed,
            }),
        );

        Ok(FileOutput {
            found: true,
            file: Some(file),
            saved_copy,
            saved_copy_compressed,
            data: Some(data),
            meta: self.meta(),
        })
    }
}
