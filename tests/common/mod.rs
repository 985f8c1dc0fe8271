//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use freeplane_dom::{IdAllocator, Mindmap};
use std::{path::PathBuf, sync::Arc};
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times. Later calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A fresh map whose identifiers are reproducible (`ID_0000010001` onwards).
#[allow(dead_code)]
pub fn pinned_map() -> Mindmap {
    Mindmap::with_allocator(Arc::new(IdAllocator::with_seed("000001")))
}

/// A small project map as an editor would write it, with rich details, notes, attributes,
/// icons, a style reference, links and an arrow link.
#[allow(dead_code)]
pub const PROJECT_MAP: &str = r##"<map version="freeplane 1.9.13">
<!--To view this file, download free mind mapping software Freeplane from https://www.freeplane.org -->
<node TEXT="Project" FOLDED="false" ID="ID_100" CREATED="1700000000000" MODIFIED="1700000000000">
<node TEXT="Tasks" ID="ID_101" CREATED="1700000000000" MODIFIED="1700000000000">
<node TEXT="Write report" ID="ID_102" CREATED="1700000000000" MODIFIED="1700000000000" STYLE_REF="Important" LINK="file:/C:/work/report%20draft.docx">
<icon BUILTIN="yes"/>
<attribute NAME="owner" VALUE="ann"/>
<attribute NAME="path" VALUE="C:\work\report"/>
<arrowlink DESTINATION="ID_104" SHAPE="CUBIC_CURVE" COLOR="#000000" WIDTH="2" TRANSPARENCY="80" FONT_SIZE="9" FONT_FAMILY="SansSerif" STARTINCLINATION="131;0;" ENDINCLINATION="131;0;" STARTARROW="NONE" ENDARROW="DEFAULT"/>
<richcontent TYPE="DETAILS">
<html>
  <head>

  </head>
  <body>
    <p>
      due friday
    </p>
  </body>
</html>
</richcontent>
</node>
<node TEXT="Review" ID="ID_103" CREATED="1700000000000" MODIFIED="1700000000000">
<attribute NAME="owner" VALUE="bob"/>
<richcontent TYPE="NOTE">
<html>
  <head>

  </head>
  <body>
    <p>
      ask bob
    </p>
  </body>
</html>
</richcontent>
</node>
</node>
<node ID="ID_104" CREATED="1700000000000" MODIFIED="1700000000000"><richcontent TYPE="NODE">
<html>
  <head>

  </head>
  <body>
    <p>
      Rich&#160;<b>heading</b>
    </p>
  </body>
</html>
</richcontent>
</node>
<node TEXT="=ID_101.text" ID="ID_105" CREATED="1700000000000" MODIFIED="1700000000000"/>
</node>
</map>
"##;

/// Write `content` to a file in a fresh temporary directory.
#[allow(dead_code)]
pub fn write_temp_map(content: &[u8]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.mm");
    std::fs::write(&path, content).unwrap();
    (dir, path)
}
