// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::error::MetadataError;

use super::record::MetadataMap;

/// Read the metadata map from a JSON file
///
/// A file that does not exist yet reads as an empty map.
pub fn read_metadata_file(path: &Path) -> Result<MetadataMap, MetadataError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No metadata file yet, starting empty");
            return Ok(MetadataMap::new());
        }
        Err(e) => {
            return Err(MetadataError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    serde_json::from_str(&content).map_err(|e| MetadataError::JsonParseFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write the metadata map to a JSON file
///
/// The data goes to a `.partial` sibling first and is renamed into place,
/// so an interrupted write never leaves a truncated file behind.
pub fn write_metadata_file(metadata: &MetadataMap, path: &Path) -> Result<(), MetadataError> {
    let json = serde_json::to_string_pretty(metadata)?;

    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = Path::new(&partial);

    std::fs::write(partial, json).map_err(|e| MetadataError::WriteFailed {
        path: partial.to_path_buf(),
        source: e,
    })?;
    std::fs::rename(partial, path).map_err(|e| MetadataError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!(path = %path.display(), records = metadata.len(), "Saved episode metadata");
    Ok(())
}
