#![allow(dead_code)]
//! Stub transcoding engine scripts for driving the subprocess path without
//! a real encoder. Each stub derives the output directory from the final
//! playlist-pattern argument, records it to a side file so tests can assert
//! on scratch cleanup, and then either produces a plausible HLS tree or
//! fails.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct StubEngine {
    pub dir: TempDir,
    pub program: PathBuf,
    outdir_file: PathBuf,
}

impl StubEngine {
    /// The output directory the engine was invoked with, recorded by the
    /// stub script at run time.
    pub fn recorded_output_dir(&self) -> Option<PathBuf> {
        fs::read_to_string(&self.outdir_file)
            .ok()
            .map(|s| PathBuf::from(s.trim()))
    }
}

fn write_stub(body: &str) -> StubEngine {
    let dir = tempfile::tempdir().expect("Failed to create stub engine dir");
    let program = dir.path().join("ffmpeg-stub.sh");
    let outdir_file = dir.path().join("outdir.txt");

    let script = format!(
        "#!/bin/sh\nfor last; do :; done\nout=$(dirname \"$(dirname \"$last\")\")\necho \"$out\" > \"{}\"\n{}",
        outdir_file.display(),
        body
    );

    fs::write(&program, script).expect("Failed to write stub script");
    let mut perms = fs::metadata(&program).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&program, perms).unwrap();

    StubEngine {
        dir,
        program,
        outdir_file,
    }
}

/// Produces a three-rendition HLS tree plus audio group and master manifest.
pub fn success_engine() -> StubEngine {
    write_stub(
        r#"for v in 1080p 720p 480p audio; do
  mkdir -p "$out/$v"
  printf '#EXTM3U\n' > "$out/$v/index.m3u8"
  printf 'segmentdata' > "$out/$v/segment_000.ts"
done
printf '#EXTM3U\n' > "$out/master.m3u8"
exit 0
"#,
    )
}

/// Like [`success_engine`], but sleeps first so tests can observe the
/// record in `Processing` while the job is in flight.
pub fn slow_success_engine() -> StubEngine {
    write_stub(
        r#"sleep 1
for v in 1080p 720p 480p audio; do
  mkdir -p "$out/$v"
  printf '#EXTM3U\n' > "$out/$v/index.m3u8"
  printf 'segmentdata' > "$out/$v/segment_000.ts"
done
printf '#EXTM3U\n' > "$out/master.m3u8"
exit 0
"#,
    )
}

/// Exits nonzero with a diagnostic on stderr.
pub fn failing_engine() -> StubEngine {
    write_stub(
        r#"echo "stub encoder exploded" >&2
exit 1
"#,
    )
}

/// Exits zero but never writes a master manifest.
pub fn no_manifest_engine() -> StubEngine {
    write_stub(
        r#"mkdir -p "$out/1080p"
printf '#EXTM3U\n' > "$out/1080p/index.m3u8"
exit 0
"#,
    )
}
