//! Stage handlers and the status-keyed dispatch table.
//!
//! A handler only describes the tool run for its stage. It never touches
//! the store or the queue; the runner applies the result.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::config::ToolPaths;
use super::error::PipelineError;
use super::layout::StorageLayout;
use crate::job::{JobId, Status};

/// What a stage is expected to leave behind on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    File(PathBuf),
    Directory(PathBuf),
}

impl Artifact {
    pub fn path(&self) -> &PathBuf {
        match self {
            Artifact::File(p) | Artifact::Directory(p) => p,
        }
    }

    /// True when the artifact exists and is non-empty.
    pub fn is_present(&self) -> bool {
        match self {
            Artifact::File(path) => std::fs::metadata(path)
                .map(|m| m.is_file() && m.len() > 0)
                .unwrap_or(false),
            Artifact::Directory(path) => std::fs::read_dir(path)
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(false),
        }
    }
}

/// A fully resolved tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    pub tool: String,
    pub args: Vec<String>,
    pub output: Artifact,
}

/// Job data a handler may read.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    pub id: JobId,
    pub source_ext: &'a str,
    pub guide_data: Option<&'a str>,
}

pub trait StageHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn plan(
        &self,
        input: &StageInput<'_>,
        layout: &StorageLayout,
    ) -> Result<StageCommand, PipelineError>;
}

fn path_arg(path: &std::path::Path) -> String {
    path.to_string_lossy().to_string()
}

/// Converts the upload to the standard container.
pub struct Normalise {
    ffmpeg: String,
}

impl Normalise {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl StageHandler for Normalise {
    fn name(&self) -> &'static str {
        "normalise"
    }

    fn plan(
        &self,
        input: &StageInput<'_>,
        layout: &StorageLayout,
    ) -> Result<StageCommand, PipelineError> {
        let source = layout.incoming(input.id, input.source_ext);
        let output = layout.normalised(input.id);

        Ok(StageCommand {
            tool: self.ffmpeg.clone(),
            args: vec![
                "-i".to_string(),
                path_arg(&source),
                path_arg(&output),
                "-hide_banner".to_string(),
                "-y".to_string(),
            ],
            output: Artifact::File(output),
        })
    }
}

/// Samples the normalised video into frames for the annotation UI.
pub struct SampleFrames {
    script: String,
    sample_rate: u32,
}

impl SampleFrames {
    pub fn new(script: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            script: script.into(),
            sample_rate,
        }
    }
}

impl StageHandler for SampleFrames {
    fn name(&self) -> &'static str {
        "sample_frames"
    }

    fn plan(
        &self,
        input: &StageInput<'_>,
        layout: &StorageLayout,
    ) -> Result<StageCommand, PipelineError> {
        let source = layout.normalised(input.id);
        let frames = layout.frames(input.id);

        // The sampler expects a directory argument with a trailing separator.
        let mut frames_arg = path_arg(&frames);
        if !frames_arg.ends_with(std::path::MAIN_SEPARATOR) {
            frames_arg.push(std::path::MAIN_SEPARATOR);
        }

        Ok(StageCommand {
            tool: self.script.clone(),
            args: vec![path_arg(&source), frames_arg, self.sample_rate.to_string()],
            output: Artifact::Directory(frames),
        })
    }
}

/// Blurs the regions described by the guide data.
pub struct Blur {
    script: String,
}

impl Blur {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl StageHandler for Blur {
    fn name(&self) -> &'static str {
        "blur"
    }

    fn plan(
        &self,
        input: &StageInput<'_>,
        layout: &StorageLayout,
    ) -> Result<StageCommand, PipelineError> {
        let guide = input
            .guide_data
            .filter(|g| !g.trim().is_empty())
            .ok_or(PipelineError::MissingGuideData(input.id))?;

        let source = layout.normalised(input.id);
        let output = layout.complete(input.id);

        Ok(StageCommand {
            tool: self.script.clone(),
            args: vec![path_arg(&source), path_arg(&output), BASE64.encode(guide)],
            output: Artifact::File(output),
        })
    }
}

/// Maps each worker-dispatchable status to its handler.
pub struct StageTable {
    handlers: Vec<(Status, Box<dyn StageHandler>)>,
}

impl StageTable {
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// The production pipeline: normalise, sample frames, blur.
    pub fn standard(tools: &ToolPaths) -> Self {
        Self::empty()
            .with(Status::Incoming, Normalise::new(&tools.ffmpeg))
            .with(
                Status::Normalised,
                SampleFrames::new(&tools.prep_script, tools.frame_sample_rate),
            )
            .with(Status::Annotated, Blur::new(&tools.blur_script))
    }

    /// Registers `handler` for `status`, replacing any previous one.
    ///
    /// # Panics
    /// Panics if `status` is not worker-dispatchable.
    pub fn with(mut self, status: Status, handler: impl StageHandler + 'static) -> Self {
        assert!(
            status.is_dispatchable(),
            "{} is not advanced by workers",
            status
        );
        self.handlers.retain(|(s, _)| *s != status);
        self.handlers.push((status, Box::new(handler)));
        self
    }

    pub fn handler_for(&self, status: Status) -> Option<&dyn StageHandler> {
        self.handlers
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, h)| h.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools() -> ToolPaths {
        ToolPaths {
            ffmpeg: "ffmpeg".to_string(),
            prep_script: "./prep.py".to_string(),
            blur_script: "./blur.py".to_string(),
            frame_sample_rate: 3,
        }
    }

    fn input(id: JobId, guide: Option<&str>) -> StageInput<'_> {
        StageInput {
            id,
            source_ext: "mov",
            guide_data: guide,
        }
    }

    #[test]
    fn test_standard_table_dispatch() {
        let table = StageTable::standard(&tools());
        assert_eq!(table.handler_for(Status::Incoming).unwrap().name(), "normalise");
        assert_eq!(
            table.handler_for(Status::Normalised).unwrap().name(),
            "sample_frames"
        );
        assert_eq!(table.handler_for(Status::Annotated).unwrap().name(), "blur");

        for status in [Status::Unknown, Status::Prepped, Status::Complete, Status::Error] {
            assert!(table.handler_for(status).is_none());
        }
    }

    #[test]
    #[should_panic(expected = "not advanced by workers")]
    fn test_table_rejects_non_dispatchable_status() {
        let _ = StageTable::empty().with(Status::Prepped, Normalise::new("ffmpeg"));
    }

    #[test]
    fn test_with_replaces_existing_handler() {
        let table = StageTable::standard(&tools()).with(Status::Incoming, Blur::new("x"));
        assert_eq!(table.handler_for(Status::Incoming).unwrap().name(), "blur");
    }

    #[test]
    fn test_normalise_command() {
        let layout = StorageLayout::new("/data");
        let id = JobId::new();
        let cmd = Normalise::new("ffmpeg").plan(&input(id, None), &layout).unwrap();

        assert_eq!(cmd.tool, "ffmpeg");
        assert_eq!(
            cmd.args,
            vec![
                "-i".to_string(),
                layout.incoming(id, "mov").to_string_lossy().to_string(),
                layout.normalised(id).to_string_lossy().to_string(),
                "-hide_banner".to_string(),
                "-y".to_string(),
            ]
        );
        assert_eq!(cmd.output, Artifact::File(layout.normalised(id)));
    }

    #[test]
    fn test_sample_frames_command() {
        let layout = StorageLayout::new("/data");
        let id = JobId::new();
        let cmd = SampleFrames::new("./prep.py", 3)
            .plan(&input(id, None), &layout)
            .unwrap();

        assert_eq!(cmd.tool, "./prep.py");
        assert_eq!(cmd.args[0], layout.normalised(id).to_string_lossy());
        assert!(cmd.args[1].ends_with(std::path::MAIN_SEPARATOR));
        assert_eq!(cmd.args[2], "3");
        assert_eq!(cmd.output, Artifact::Directory(layout.frames(id)));
    }

    #[test]
    fn test_blur_encodes_guide_data() {
        let layout = StorageLayout::new("/data");
        let id = JobId::new();
        let guide = r#"{"boxes":[{"x":1}]}"#;
        let cmd = Blur::new("./blur.py")
            .plan(&input(id, Some(guide)), &layout)
            .unwrap();

        assert_eq!(cmd.args[1], layout.complete(id).to_string_lossy());
        let decoded = BASE64.decode(&cmd.args[2]).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), guide);
    }

    #[test]
    fn test_blur_without_guide_data_fails_to_plan() {
        let layout = StorageLayout::new("/data");
        let id = JobId::new();
        let err = Blur::new("./blur.py")
            .plan(&input(id, None), &layout)
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingGuideData(missing) if missing == id));

        assert!(Blur::new("./blur.py")
            .plan(&input(id, Some("  ")), &layout)
            .is_err());
    }

    #[test]
    fn test_artifact_presence() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("out.mp4");
        let dir = temp.path().join("frames");

        assert!(!Artifact::File(file.clone()).is_present());
        std::fs::write(&file, b"").unwrap();
        assert!(!Artifact::File(file.clone()).is_present());
        std::fs::write(&file, b"data").unwrap();
        assert!(Artifact::File(file).is_present());

        std::fs::create_dir(&dir).unwrap();
        assert!(!Artifact::Directory(dir.clone()).is_present());
        std::fs::write(dir.join("0.jpg"), b"jpg").unwrap();
        assert!(Artifact::Directory(dir).is_present());
    }
}
