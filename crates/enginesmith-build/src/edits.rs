//! Text edits applied to generated build files

use crate::target::Platform;

const ICU_DATA_FILE_OFF: &str = "icu_use_data_file = false";
const BITCODE_MARKER_ON: &str = "bitcode_marker = true";
const BITCODE_MARKER_OFF: &str = "bitcode_marker = false";
const ANGLE_ARGS: &str = "skia_use_angle = true\nskia_use_egl = true";

/// Linker flag removed from Android response files before relinking
pub const ICF_ITERATIONS_FLAG: &str = ",--icf-iterations=5";

/// Adjust the generator's `args.gn` for `platform`
///
/// Lines are appended verbatim to the existing content; the generator
/// output always ends with a newline.
pub fn edit_gn_args(content: &str, platform: Platform) -> String {
    match platform {
        Platform::Mac => format!("{content}{ICU_DATA_FILE_OFF}"),
        Platform::Ios => {
            let edited = content.replace(BITCODE_MARKER_ON, BITCODE_MARKER_OFF);
            format!("{edited}{ICU_DATA_FILE_OFF}")
        }
        Platform::Windows => format!("{content}{ANGLE_ARGS}"),
        Platform::Android => content.to_string(),
    }
}

/// Remove the ICF iteration flag from a response file
pub fn strip_icf_iterations(content: &str) -> String {
    content.replace(ICF_ITERATIONS_FLAG, "")
}
