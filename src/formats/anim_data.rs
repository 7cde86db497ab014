//! `AnimData.xml`, the index of a directory of per-animation sheets
//!
//! Every non-alias `Anim` owns `<Name>-Anim.png`, `<Name>-Offsets.png` and
//! `<Name>-Shadow.png`, cut into `FrameWidth` x `FrameHeight` cells. All
//! directions share one list of `Durations`.

use std::collections::HashMap;

use crate::data::AnimGroup;

use super::{
    frame_data::{parse_group_header, write_group_header},
    xml::{parse_document, write_document, Element},
    parse_duration, FormatError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimDataEntry {
    /// Name, index, key frames and alias; frame lists are empty
    pub group: AnimGroup,
    pub frame_size: Option<(u32, u32)>,
    pub durations: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimData {
    pub shadow_size: u32,
    pub anims: Vec<AnimDataEntry>,
}

fn parse_durations(name: &str, element: &Element) -> Result<Vec<u32>, FormatError> {
    element
        .children_named("Duration")
        .map(|duration| parse_duration(name, duration))
        .collect()
}

/// The duration list shared by every direction of `group`.
///
/// Empty directions are ignored. Directions with a different number of frames
/// and directions with different values are reported as separate errors.
pub fn uniform_durations(group: &AnimGroup) -> Result<Vec<u32>, FormatError> {
    let mut uniform: Option<Vec<u32>> = None;

    for sequence in group.directions.iter().filter(|sequence| !sequence.is_empty()) {
        let durations = sequence.durations();
        match &uniform {
            None => uniform = Some(durations),
            Some(first) if first.len() != durations.len() => {
                return Err(FormatError::FrameCountMismatch {
                    group: group.name.clone(),
                });
            }
            Some(first) if *first != durations => {
                return Err(FormatError::DurationMismatch {
                    group: group.name.clone(),
                });
            }
            Some(_) => {}
        }
    }

    Ok(uniform.unwrap_or_default())
}

impl AnimData {
    pub fn from_xml(xml: &str) -> Result<Self, FormatError> {
        let root = parse_document(xml)?;
        let anims = root.required("Anims")?;
        let shadow_size = root.required_value("ShadowSize")?;

        let anims = anims
            .children_named("Anim")
            .map(|anim| {
                let group = parse_group_header(anim)?;
                let width: Option<u32> = anim.child_value("FrameWidth")?;
                let height: Option<u32> = anim.child_value("FrameHeight")?;
                let durations = match anim.child("Durations") {
                    Some(element) => parse_durations(&group.name, element)?,
                    None => Vec::new(),
                };
                Ok(AnimDataEntry {
                    frame_size: width.zip(height),
                    durations,
                    group,
                })
            })
            .collect::<Result<Vec<_>, FormatError>>()?;

        Ok(Self { shadow_size, anims })
    }

    /// Builds the index for exported groups. `frame_sizes` holds the cell size
    /// of each group that owns sheets.
    pub fn from_groups(
        shadow_size: u32,
        groups: &[AnimGroup],
        frame_sizes: &HashMap<String, (u32, u32)>,
    ) -> Result<Self, FormatError> {
        let anims = groups
            .iter()
            .map(|group| {
                let mut header = group.clone();
                for sequence in &mut header.directions {
                    sequence.frames.clear();
                }
                if group.is_alias() {
                    return Ok(AnimDataEntry {
                        group: header,
                        frame_size: None,
                        durations: Vec::new(),
                    });
                }
                Ok(AnimDataEntry {
                    group: header,
                    frame_size: frame_sizes.get(&group.name).copied(),
                    durations: uniform_durations(group)?,
                })
            })
            .collect::<Result<Vec<_>, FormatError>>()?;

        Ok(Self { shadow_size, anims })
    }

    /// Aliases are always written as `CopyOf`, since they own no sheets.
    pub fn to_xml(&self) -> Result<String, FormatError> {
        let mut root = Element::new("AnimData");
        root.push_text("ShadowSize", self.shadow_size);
        let anims = root.push(Element::new("Anims"));

        for entry in &self.anims {
            let anim = anims.push(Element::new("Anim"));
            if !write_group_header(anim, &entry.group, true, entry.frame_size) {
                continue;
            }
            let durations = anim.push(Element::new("Durations"));
            for duration in &entry.durations {
                durations.push_text("Duration", duration);
            }
        }

        write_document(&root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AnimFrame, AnimationSequence, Direction};

    const XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<AnimData>
  <ShadowSize>2</ShadowSize>
  <Anims>
    <Anim>
      <Name>Pose</Name>
      <Index>5</Index>
      <CopyOf>Walk</CopyOf>
    </Anim>
    <Anim>
      <Name>Walk</Name>
      <Index>0</Index>
      <FrameWidth>32</FrameWidth>
      <FrameHeight>40</FrameHeight>
      <HitFrame>1</HitFrame>
      <Durations>
        <Duration>8</Duration>
        <Duration>10</Duration>
      </Durations>
    </Anim>
  </Anims>
</AnimData>
"#;

    fn group_with_durations(per_direction: &[&[u32]]) -> AnimGroup {
        let mut group = AnimGroup::new("Attack", Some(1));
        for (sequence, durations) in group.directions.iter_mut().zip(per_direction.iter().cycle()) {
            *sequence = AnimationSequence::from_frames(durations.iter().map(|&duration| AnimFrame {
                duration,
                ..Default::default()
            }));
        }
        group
    }

    #[test]
    fn test_parse() {
        let data = AnimData::from_xml(XML).unwrap();
        assert_eq!(data.shadow_size, 2);
        assert_eq!(data.anims.len(), 2);
        assert!(data.anims[0].group.is_alias());
        assert_eq!(data.anims[0].frame_size, None);

        let walk = &data.anims[1];
        assert_eq!(walk.frame_size, Some((32, 40)));
        assert_eq!(walk.durations, vec![8, 10]);
        assert_eq!(walk.group.hit_frame, Some(1));
        assert_eq!(walk.group.rush_frame, None);
    }

    #[test]
    fn test_write_matches_parse() {
        let data = AnimData::from_xml(XML).unwrap();
        let written = data.to_xml().unwrap();
        assert_eq!(AnimData::from_xml(&written).unwrap(), data);
        assert!(written.contains("\n  <ShadowSize>2</ShadowSize>\n"));
        assert!(written.contains("<Name>Pose</Name>"));
    }

    #[test]
    fn test_rejects_bad_durations() {
        for bad in ["0", "-3"] {
            let xml = XML.replace("<Duration>10</Duration>", &format!("<Duration>{bad}</Duration>"));
            assert!(matches!(
                AnimData::from_xml(&xml),
                Err(FormatError::InvalidDuration { .. })
            ));
        }
        let xml = XML.replace("<Duration>10</Duration>", "<Duration>ten</Duration>");
        assert!(matches!(
            AnimData::from_xml(&xml),
            Err(FormatError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_uniform_durations() {
        let group = group_with_durations(&[&[2, 4]]);
        assert_eq!(uniform_durations(&group).unwrap(), vec![2, 4]);

        let mut sparse = group.clone();
        sparse.directions[Direction::Up.index()] = AnimationSequence::default();
        assert_eq!(uniform_durations(&sparse).unwrap(), vec![2, 4]);

        let counts = group_with_durations(&[&[2, 4], &[2]]);
        assert!(matches!(
            uniform_durations(&counts),
            Err(FormatError::FrameCountMismatch { .. })
        ));
        let values = group_with_durations(&[&[2, 4], &[2, 5]]);
        assert!(matches!(
            uniform_durations(&values),
            Err(FormatError::DurationMismatch { .. })
        ));
    }

    #[test]
    fn test_from_groups_writes_sizes_and_aliases() {
        let groups = vec![
            group_with_durations(&[&[3]]),
            AnimGroup::alias("Pose", None, "Attack"),
        ];
        let sizes = HashMap::from([("Attack".to_string(), (24, 16))]);
        let data = AnimData::from_groups(1, &groups, &sizes).unwrap();
        assert_eq!(data.anims[0].frame_size, Some((24, 16)));
        assert_eq!(data.anims[0].durations, vec![3]);
        assert!(data.anims[0].group.directions.iter().all(|s| s.is_empty()));
        assert!(data.anims[1].group.is_alias());
        let xml = data.to_xml().unwrap();
        assert!(xml.contains("<CopyOf>Attack</CopyOf>"));
    }
}
