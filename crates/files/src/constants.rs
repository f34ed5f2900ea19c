/// Marks an in-flight write. New temporary files are named `.tmp.<uuid>`; names from earlier
/// releases (`.<filename>.tmp.<uuid>`) carry the same marker.
pub const TEMP_FILE_MARKER: &str = ".tmp.";
