use crate::{Animation, Attachment};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<usize>,
    pub length: f32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
    pub transform_mode: TransformMode,
    /// Editor color, used for debug drawing.
    pub color: [f32; 4],
}

impl BoneData {
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            length: 0.0,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            transform_mode: TransformMode::Normal,
            color: [0.61, 0.61, 0.61, 1.0],
        }
    }
}

/// How a bone inherits its parent's world transform.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum TransformMode {
    #[default]
    Normal,
    OnlyTranslation,
    NoRotationOrReflection,
    NoScale,
    NoScaleOrReflection,
}

#[derive(Clone, Debug)]
pub struct SlotData {
    pub name: String,
    pub bone: usize,
    pub attachment: Option<String>,
    pub color: [f32; 4],
    pub dark_color: Option<[f32; 3]>,
    pub blend: BlendMode,
}

impl SlotData {
    pub fn new(name: impl Into<String>, bone: usize) -> Self {
        Self {
            name: name.into(),
            bone,
            attachment: None,
            color: [1.0; 4],
            dark_color: None,
            blend: BlendMode::Normal,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

/// Named set of attachments, keyed by slot index then attachment name.
#[derive(Clone, Debug, Default)]
pub struct Skin {
    pub name: String,
    attachments: Vec<HashMap<String, Attachment>>,
}

impl Skin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attachments: Vec::new(),
        }
    }

    pub fn set_attachment(
        &mut self,
        slot_index: usize,
        name: impl Into<String>,
        attachment: Attachment,
    ) {
        if self.attachments.len() <= slot_index {
            self.attachments.resize_with(slot_index + 1, HashMap::new);
        }
        self.attachments[slot_index].insert(name.into(), attachment);
    }

    pub fn attachment(&self, slot_index: usize, name: &str) -> Option<&Attachment> {
        self.attachments
            .get(slot_index)
            .and_then(|slot_map| slot_map.get(name))
    }

    pub fn attachment_mut(&mut self, slot_index: usize, name: &str) -> Option<&mut Attachment> {
        self.attachments
            .get_mut(slot_index)
            .and_then(|slot_map| slot_map.get_mut(name))
    }

    /// Iterates `(slot_index, name, attachment)` entries.
    pub fn attachments(&self) -> impl Iterator<Item = (usize, &str, &Attachment)> {
        self.attachments.iter().enumerate().flat_map(|(slot, map)| {
            map.iter()
                .map(move |(name, attachment)| (slot, name.as_str(), attachment))
        })
    }

    pub fn attachments_mut(&mut self) -> impl Iterator<Item = &mut Attachment> {
        self.attachments.iter_mut().flat_map(|map| map.values_mut())
    }
}

#[derive(Clone, Debug, Default)]
pub struct EventData {
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string: String,
    pub audio_path: String,
    pub volume: f32,
    pub balance: f32,
}

/// A fired (or keyed) event instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub time: f32,
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string: String,
    pub audio_path: String,
    pub volume: f32,
    pub balance: f32,
}

impl Event {
    pub fn from_data(time: f32, data: &EventData) -> Self {
        Self {
            time,
            name: data.name.clone(),
            int_value: data.int_value,
            float_value: data.float_value,
            string: data.string.clone(),
            audio_path: data.audio_path.clone(),
            volume: data.volume,
            balance: data.balance,
        }
    }
}

pub const DEFAULT_SKIN_NAME: &str = "default";

#[derive(Clone, Debug, Default)]
pub struct SkeletonData {
    pub name: Option<String>,
    pub spine_version: Option<String>,
    pub hash: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    pub skins: HashMap<String, Skin>,
    pub events: HashMap<String, EventData>,
    pub animations: Vec<Animation>,
}

impl SkeletonData {
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    pub fn animation(&self, name: &str) -> Option<(usize, &Animation)> {
        self.animations
            .iter()
            .enumerate()
            .find(|(_, a)| a.name == name)
    }

    pub fn skin(&self, name: &str) -> Option<&Skin> {
        self.skins.get(name)
    }

    pub fn default_skin(&self) -> Option<&Skin> {
        self.skins.get(DEFAULT_SKIN_NAME)
    }

    /// Looks an attachment up in the named skin, falling back to the default skin.
    pub fn attachment(
        &self,
        skin: Option<&str>,
        slot_index: usize,
        name: &str,
    ) -> Option<&Attachment> {
        self.resolve_attachment(skin, slot_index, name)
            .map(|(_, attachment)| attachment)
    }

    /// Like [`SkeletonData::attachment`], also naming the skin the entry was found in.
    pub fn resolve_attachment(
        &self,
        skin: Option<&str>,
        slot_index: usize,
        name: &str,
    ) -> Option<(&Skin, &Attachment)> {
        if let Some(found) = skin.and_then(|s| self.skin(s)).and_then(|s| {
            s.attachment(slot_index, name)
                .map(|attachment| (s, attachment))
        }) {
            return Some(found);
        }
        let default = self.default_skin()?;
        Some((default, default.attachment(slot_index, name)?))
    }
}
