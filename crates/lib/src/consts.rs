//! File names and directory conventions shared by the build stages.

pub const APP_NAME: &str = "gamepack";

/// Name of the per-build working directory created under the temp root.
pub const WORKING_DIR_NAME: &str = "GDDeploymentTemporaries";

/// Log file the queue worker writes compiler output to, inside the generated directory.
pub const COMPILATION_LOG: &str = "LatestCompilationOutput.txt";

pub const DESCRIPTOR_PLAINTEXT: &str = "GDProjectSrcFile.gdg";
pub const DESCRIPTOR_ENCRYPTED: &str = "src";
pub const CONTAINER_FILE: &str = "gam.egd";

pub const DEFAULT_WIN_EXECUTABLE: &str = "GameWin.exe";
pub const DEFAULT_LINUX_EXECUTABLE: &str = "GameLinux";
pub const DEFAULT_MAC_EXECUTABLE: &str = "GameMac";

/// Name of the launcher copied next to the archive in compressed mode.
pub const COMPRESSED_LAUNCHER: &str = "internalstart.exe";
pub const ARCHIVE_FILE: &str = "archive.zip";
pub const SFX_STUB: &str = "7zS.sfx";
pub const SFX_CONFIG: &str = "config.txt";
pub const DYNEXT_FILE: &str = "dynext.dxgd";

pub const GENERATED_SOURCE_SUFFIX: &str = "RuntimeEventsSource.cpp";
pub const OBJECT_FILE_SUFFIX: &str = "RuntimeObjectFile.o";

/// Language tag of source files that are compiled and linked.
pub const NATIVE_LANGUAGE: &str = "C++";

/// Extensions that ship no runtime file even though they have runtime code.
pub const BUILTIN_EXTENSION: &str = "BuiltinCommonInstructions";
/// Extension without namespace that still ships a runtime file.
pub const NAMESPACELESS_RUNTIME_EXTENSION: &str = "CommonDialogs";
