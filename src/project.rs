//! Sheet sets on disk
//!
//! A single sheet is a directory with `FrameData.xml`, `Anim.png` and an
//! optional `Offsets.png`. A multi-sheet set is an `AnimData.xml` next to
//! `<Name>-Anim.png`, `<Name>-Offsets.png` and `<Name>-Shadow.png` per group.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::formats::{AnimData, FrameData, LoadWarning, SaveOptions};
use crate::graphics::{
    atlas::{
        analyser::{cell_at, grid_size},
        encode_png, pack_groups,
        splitter::{split_atlas, SplitSheet},
        AtlasConfig, AtlasError, GroupInput, GroupSheets,
    },
    geometry::Offset,
    markers::{decode_markers, ActionPoints, HandRoles, RowOrder},
};
use crate::progress::ProgressFile;

pub const FRAME_DATA_FILE: &str = "FrameData.xml";
pub const ANIM_FILE: &str = "Anim.png";
pub const OFFSETS_FILE: &str = "Offsets.png";
pub const ANIM_DATA_FILE: &str = "AnimData.xml";
const DEBUG_FRAMES_DIR: &str = "debug_unique_frames";

fn load_image(path: &Path) -> Result<RgbaImage, AtlasError> {
    Ok(image::open(path)?.to_rgba8())
}

/// Decodes the attachment points of every cell of an offsets sheet, relative
/// to the cell centre. Cells are numbered row by row like frame indices.
pub fn decode_cell_points(
    offsets: &RgbaImage,
    frame_size: (u32, u32),
    order: RowOrder,
    roles: HandRoles,
) -> Result<Vec<Option<ActionPoints>>, AtlasError> {
    let (frame_width, frame_height) = frame_size;
    let (columns, rows) = grid_size(OFFSETS_FILE, offsets, frame_width, frame_height)?;
    let centre = Offset::new(frame_width as i32 / 2, frame_height as i32 / 2);

    (0..rows)
        .flat_map(|row| (0..columns).map(move |column| (column, row)))
        .enumerate()
        .map(|(frame_index, (column, row))| {
            let cell = cell_at(offsets, column, row, frame_width, frame_height);
            decode_markers(&cell, order, roles)
                .map(|points| points.map(|points| points.translated(-centre)))
                .map_err(|source| AtlasError::AtlasMarkerDecode {
                    frame_index,
                    source,
                })
        })
        .collect()
}

/// A packed sheet with its metadata
#[derive(Debug, Clone)]
pub struct SingleSheet {
    pub frame_data: FrameData,
    pub anim: RgbaImage,
    pub offsets: Option<RgbaImage>,
    /// Attachment points of each sheet cell, relative to the cell centre
    pub action_points: Vec<Option<ActionPoints>>,
}

impl SingleSheet {
    pub fn frame_size(&self) -> (u32, u32) {
        (self.frame_data.frame_width, self.frame_data.frame_height)
    }

    /// Number of cells in the sheet
    pub fn frame_count(&self) -> usize {
        let (width, height) = self.frame_size();
        if width == 0 || height == 0 {
            return 0;
        }
        ((self.anim.width() / width) * (self.anim.height() / height)) as usize
    }

    /// Loads a single-sheet directory. Recoverable problems are logged and
    /// returned alongside the sheet.
    pub fn load(dir: &Path, config: &AtlasConfig) -> Result<(Self, Vec<LoadWarning>), AtlasError> {
        let xml = fs::read_to_string(dir.join(FRAME_DATA_FILE))?;
        let (frame_data, warnings) = FrameData::from_xml(&xml, config.reduce_rush_frames)?;
        for warning in &warnings {
            warn!("{}", warning);
        }

        let anim = load_image(&dir.join(ANIM_FILE))?;
        let frame_size = (frame_data.frame_width, frame_data.frame_height);
        grid_size(ANIM_FILE, &anim, frame_size.0, frame_size.1)?;

        let offsets_path = dir.join(OFFSETS_FILE);
        let (offsets, action_points) = if offsets_path.exists() {
            let offsets = load_image(&offsets_path)?;
            if offsets.dimensions() != anim.dimensions() {
                return Err(AtlasError::malformed(
                    OFFSETS_FILE,
                    "dimensions do not match Anim.png",
                ));
            }
            let points =
                decode_cell_points(&offsets, frame_size, config.row_order, config.hand_roles)?;
            (Some(offsets), points)
        } else {
            (None, Vec::new())
        };

        let sheet = Self {
            frame_data,
            anim,
            offsets,
            action_points,
        };
        info!(
            "Loaded {} groups over {} sheet frames from {}",
            sheet.frame_data.groups.len(),
            sheet.frame_count(),
            dir.display()
        );
        Ok((sheet, warnings))
    }

    /// Writes the sheet into `dir`. Everything is encoded before the first file
    /// is written.
    pub fn save(&self, dir: &Path, config: &AtlasConfig) -> Result<(), AtlasError> {
        let xml = self.frame_data.to_xml(SaveOptions::from_config(config))?;
        let mut files = vec![
            (dir.join(FRAME_DATA_FILE), xml.into_bytes()),
            (dir.join(ANIM_FILE), encode_png(&self.anim, config)?),
        ];
        if let Some(offsets) = &self.offsets {
            files.push((dir.join(OFFSETS_FILE), encode_png(offsets, config)?));
        }

        write_files(dir, &files)?;
        info!("Saved single sheet to {}", dir.display());
        Ok(())
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Writes every file under a `.part` name first and renames them into place
/// once all writes succeeded. A failed write removes the staged files again.
fn write_files(dir: &Path, files: &[(PathBuf, Vec<u8>)]) -> Result<(), AtlasError> {
    fs::create_dir_all(dir)?;

    let mut staged = Vec::with_capacity(files.len());
    for (path, data) in files {
        let partial = partial_path(path);
        if let Err(e) = fs::write(&partial, data) {
            for staged_path in staged.iter().chain(std::iter::once(&partial)) {
                if let Err(cleanup) = fs::remove_file(staged_path) {
                    debug!("Could not remove {}: {}", staged_path.display(), cleanup);
                }
            }
            return Err(e.into());
        }
        staged.push(partial);
    }

    for (partial, (path, _)) in staged.iter().zip(files) {
        fs::rename(partial, path)?;
    }
    Ok(())
}

fn sheet_path(dir: &Path, name: &str, kind: &str) -> PathBuf {
    dir.join(format!("{}-{}.png", name, kind))
}

fn load_group_sheets(dir: &Path, name: &str) -> Result<GroupSheets, AtlasError> {
    let required = |kind: &str| {
        let path = sheet_path(dir, name, kind);
        if !path.exists() {
            return Err(AtlasError::malformed(
                name,
                format!("{}-{}.png not found", name, kind),
            ));
        }
        load_image(&path)
    };
    let anim = required("Anim")?;
    let offsets = required("Offsets")?;

    let shadow_path = sheet_path(dir, name, "Shadow");
    let shadow = if shadow_path.exists() {
        Some(load_image(&shadow_path)?)
    } else {
        None
    };

    Ok(GroupSheets {
        anim,
        offsets,
        shadow,
    })
}

/// Result of packing a multi-sheet set
#[derive(Debug)]
pub struct ImportedSheet {
    pub sheet: SingleSheet,
    pub unique_frames: Vec<RgbaImage>,
    /// Aliases whose source group does not exist
    pub unresolved: Vec<String>,
}

/// Reads `AnimData.xml` and every group's sheets, then packs them into one
/// deduplicated sheet.
pub fn import_multi_sheet(
    anim_data_path: &Path,
    config: &AtlasConfig,
    progress: &ProgressFile,
) -> Result<ImportedSheet, AtlasError> {
    let dir = anim_data_path.parent().unwrap_or_else(|| Path::new("."));
    let data = AnimData::from_xml(&fs::read_to_string(anim_data_path)?)?;
    let total = data.anims.len();

    let mut inputs = Vec::with_capacity(total);
    for (i, entry) in data.anims.into_iter().enumerate() {
        progress.report(i + 1, total, "load", &entry.group.name);
        if entry.group.is_alias() {
            inputs.push(GroupInput {
                group: entry.group,
                sheets: None,
                frame_size: (0, 0),
                durations: entry.durations,
            });
            continue;
        }

        let frame_size = entry.frame_size.ok_or_else(|| {
            AtlasError::malformed(&entry.group.name, "could not find frame dimensions")
        })?;
        let sheets = load_group_sheets(dir, &entry.group.name)?;
        inputs.push(GroupInput {
            group: entry.group,
            sheets: Some(sheets),
            frame_size,
            durations: entry.durations,
        });
    }

    progress.report(total, total, "pack", "Packing unique frames");
    let packed = pack_groups(inputs, config)?;
    let action_points = packed.unique_points.iter().copied().map(Some).collect();

    let sheet = SingleSheet {
        frame_data: FrameData {
            frame_width: packed.frame_size.0,
            frame_height: packed.frame_size.1,
            shadow_size: data.shadow_size,
            groups: packed.groups,
        },
        anim: packed.atlas,
        offsets: Some(packed.offsets),
        action_points,
    };

    Ok(ImportedSheet {
        sheet,
        unique_frames: packed.unique_frames,
        unresolved: packed.unresolved,
    })
}

/// Packs a multi-sheet set and saves the result as a single sheet in
/// `out_dir`.
pub fn pack_directory(
    anim_data_path: &Path,
    out_dir: &Path,
    config: &AtlasConfig,
    progress: &ProgressFile,
) -> Result<SingleSheet, AtlasError> {
    let imported = import_multi_sheet(anim_data_path, config, progress)?;

    progress.report(1, 1, "save", &out_dir.display().to_string());
    imported.sheet.save(out_dir, config)?;

    if config.debug {
        let debug_dir = out_dir.join(DEBUG_FRAMES_DIR);
        fs::create_dir_all(&debug_dir)?;
        for (i, frame) in imported.unique_frames.iter().enumerate() {
            frame.save(debug_dir.join(format!("unique_frame_{:04}.png", i)))?;
        }
        info!(
            "Saved {} unique frames to {}",
            imported.unique_frames.len(),
            debug_dir.display()
        );
    }

    Ok(imported.sheet)
}

/// Splits a single sheet into per-group sheets plus `AnimData.xml` in
/// `out_dir`. Nothing is written unless every group splits cleanly.
pub fn export_multi_sheet(
    sheet: &SingleSheet,
    out_dir: &Path,
    shadow_marker: &RgbaImage,
    config: &AtlasConfig,
    progress: &ProgressFile,
) -> Result<Vec<SplitSheet>, AtlasError> {
    let groups = &sheet.frame_data.groups;
    progress.report(0, groups.len(), "split", "Splitting sheet");

    let split = split_atlas(
        &sheet.anim,
        sheet.offsets.as_ref(),
        shadow_marker,
        sheet.frame_size(),
        groups,
        config,
    )?;

    let frame_sizes: HashMap<String, (u32, u32)> = split
        .iter()
        .map(|group| (group.name.clone(), group.frame_size))
        .collect();
    let xml = AnimData::from_groups(sheet.frame_data.shadow_size, groups, &frame_sizes)?.to_xml()?;

    let mut files = vec![(out_dir.join(ANIM_DATA_FILE), xml.into_bytes())];
    for (i, group) in split.iter().enumerate() {
        progress.report(i + 1, split.len(), "encode", &group.name);
        files.push((sheet_path(out_dir, &group.name, "Anim"), encode_png(&group.anim, config)?));
        files.push((
            sheet_path(out_dir, &group.name, "Offsets"),
            encode_png(&group.offsets, config)?,
        ));
        files.push((
            sheet_path(out_dir, &group.name, "Shadow"),
            encode_png(&group.shadow, config)?,
        ));
    }

    write_files(out_dir, &files)?;
    info!("Exported {} sheets to {}", split.len(), out_dir.display());
    Ok(split)
}
