//! Block Type Table
//!
//! A fixed table mapping opcode name to its ordered fields and inputs,
//! used by the lowerer to validate argument counts and pick the right
//! `StageValue` encoding per slot. This is not the full Scratch opcode
//! set — it's the subset the compiler itself emits (see `parser.rs`'s
//! desugaring and `optimizer.rs`'s fold targets) plus a representative
//! spread of the common motion/looks/sound/control/sensing/operator/
//! data vocabulary a program's source can name directly. Extending it
//! is mechanical: add a row, nothing else changes shape.
//!
//! `procedures_call`/`procedures_definition`/`procedures_prototype`/
//! `argument_reporter_string_number` are not in this table; their
//! input lists are generated per-declaration from the user's own
//! parameter list; `lowerer.rs` handles them directly.

use lazy_static::lazy_static;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// A value-typed input (`StageValue::as_normal`).
    Normal,
    /// A boolean-typed input (`StageValue::as_boolean`).
    Boolean,
    /// A C-block substack input (`StageValue::as_block`).
    Block,
}

#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub name: &'static str,
    pub kind: SlotKind,
}

const fn normal(name: &'static str) -> Slot {
    Slot { name, kind: SlotKind::Normal }
}
const fn boolean(name: &'static str) -> Slot {
    Slot { name, kind: SlotKind::Boolean }
}
const fn block(name: &'static str) -> Slot {
    Slot { name, kind: SlotKind::Block }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    Pen,
    Music,
    VideoSensing,
    Text2Speech,
    Translate,
}

impl Extension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Extension::Pen => "pen",
            Extension::Music => "music",
            Extension::VideoSensing => "videoSensing",
            Extension::Text2Speech => "text2speech",
            Extension::Translate => "translate",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockSpec {
    pub fields: &'static [Slot],
    pub inputs: &'static [Slot],
    pub extension: Option<Extension>,
}

impl BlockSpec {
    /// Every slot in this table is mandatory; there's no optional
    /// trailing argument in the current vocabulary.
    pub fn required_count(&self) -> usize {
        self.fields.len() + self.inputs.len()
    }

    pub fn total_count(&self) -> usize {
        self.required_count()
    }
}

macro_rules! spec {
    ([$($f:expr),* $(,)?], [$($i:expr),* $(,)?]) => {
        BlockSpec { fields: &const { [$($f),*] }, inputs: &const { [$($i),*] }, extension: None }
    };
    ([$($f:expr),* $(,)?], [$($i:expr),* $(,)?], $ext:expr) => {
        BlockSpec { fields: &const { [$($f),*] }, inputs: &const { [$($i),*] }, extension: Some($ext) }
    };
}

lazy_static! {
    pub static ref BLOCK_TYPES: HashMap<&'static str, BlockSpec> = {
        let mut m = HashMap::new();

        // -- Motion -------------------------------------------------
        m.insert("motion_movesteps", spec!([], [normal("STEPS")]));
        m.insert("motion_turnright", spec!([], [normal("DEGREES")]));
        m.insert("motion_turnleft", spec!([], [normal("DEGREES")]));
        m.insert("motion_gotoxy", spec!([], [normal("X"), normal("Y")]));
        m.insert("motion_glidesecstoxy", spec!([], [normal("SECS"), normal("X"), normal("Y")]));
        m.insert("motion_pointindirection", spec!([], [normal("DIRECTION")]));
        m.insert("motion_changexby", spec!([], [normal("DX")]));
        m.insert("motion_changeyby", spec!([], [normal("DY")]));
        m.insert("motion_setx", spec!([], [normal("X")]));
        m.insert("motion_sety", spec!([], [normal("Y")]));
        m.insert("motion_xposition", spec!([], []));
        m.insert("motion_yposition", spec!([], []));
        m.insert("motion_direction", spec!([], []));

        // -- Looks ----------------------------------------------------
        m.insert("looks_sayforsecs", spec!([], [normal("MESSAGE"), normal("SECS")]));
        m.insert("looks_say", spec!([], [normal("MESSAGE")]));
        m.insert("looks_thinkforsecs", spec!([], [normal("MESSAGE"), normal("SECS")]));
        m.insert("looks_think", spec!([], [normal("MESSAGE")]));
        m.insert("looks_show", spec!([], []));
        m.insert("looks_hide", spec!([], []));
        m.insert("looks_changesizeby", spec!([], [normal("CHANGE")]));
        m.insert("looks_setsizeto", spec!([], [normal("SIZE")]));
        m.insert("looks_size", spec!([], []));

        // -- Sound ------------------------------------------------------
        m.insert("sound_stopallsounds", spec!([], []));
        m.insert("sound_changevolumeby", spec!([], [normal("VOLUME")]));
        m.insert("sound_setvolumeto", spec!([], [normal("VOLUME")]));
        m.insert("sound_volume", spec!([], []));

        // -- Events -----------------------------------------------------
        m.insert("event_whenflagclicked", spec!([], []));
        m.insert("event_broadcast", spec!([], [normal("BROADCAST_INPUT")]));
        m.insert("event_broadcastandwait", spec!([], [normal("BROADCAST_INPUT")]));

        // -- Control ------------------------------------------------
        m.insert("control_wait", spec!([], [normal("DURATION")]));
        m.insert("control_repeat", spec!([], [normal("TIMES"), block("SUBSTACK")]));
        m.insert("control_forever", spec!([], [block("SUBSTACK")]));
        m.insert("control_if", spec!([], [boolean("CONDITION"), block("SUBSTACK")]));
        m.insert(
            "control_if_else",
            spec!([], [boolean("CONDITION"), block("SUBSTACK"), block("SUBSTACK2")]),
        );
        m.insert("control_repeat_until", spec!([], [boolean("CONDITION"), block("SUBSTACK")]));
        m.insert("control_stop", spec!([Slot { name: "STOP_OPTION", kind: SlotKind::Normal }], []));
        m.insert("control_create_clone_of", spec!([], [normal("CLONE_OPTION")]));
        m.insert("control_create_clone_of_menu", spec!([normal("CLONE_OPTION")], []));
        m.insert("control_delete_this_clone", spec!([], []));
        m.insert("control_start_as_clone", spec!([], []));

        // -- Sensing ------------------------------------------------
        m.insert("sensing_touchingobject", spec!([], [normal("TOUCHINGOBJECTMENU")]));
        m.insert("sensing_keypressed", spec!([], [normal("KEY_OPTION")]));
        m.insert("sensing_mousedown", spec!([], []));
        m.insert("sensing_mousex", spec!([], []));
        m.insert("sensing_mousey", spec!([], []));
        m.insert("sensing_timer", spec!([], []));
        m.insert("sensing_resettimer", spec!([], []));

        // -- Operators ------------------------------------------------
        m.insert("operator_add", spec!([], [normal("NUM1"), normal("NUM2")]));
        m.insert("operator_subtract", spec!([], [normal("NUM1"), normal("NUM2")]));
        m.insert("operator_multiply", spec!([], [normal("NUM1"), normal("NUM2")]));
        m.insert("operator_divide", spec!([], [normal("NUM1"), normal("NUM2")]));
        m.insert("operator_mod", spec!([], [normal("NUM1"), normal("NUM2")]));
        m.insert("operator_gt", spec!([], [normal("OPERAND1"), normal("OPERAND2")]));
        m.insert("operator_lt", spec!([], [normal("OPERAND1"), normal("OPERAND2")]));
        m.insert("operator_equals", spec!([], [normal("OPERAND1"), normal("OPERAND2")]));
        m.insert("operator_and", spec!([], [boolean("OPERAND1"), boolean("OPERAND2")]));
        m.insert("operator_or", spec!([], [boolean("OPERAND1"), boolean("OPERAND2")]));
        m.insert("operator_not", spec!([], [boolean("OPERAND")]));
        m.insert("operator_join", spec!([], [normal("STRING1"), normal("STRING2")]));
        m.insert("operator_letter_of", spec!([], [normal("LETTER"), normal("STRING")]));
        m.insert("operator_length", spec!([], [normal("STRING")]));
        m.insert("operator_contains", spec!([], [normal("STRING1"), normal("STRING2")]));
        m.insert("operator_random", spec!([], [normal("FROM"), normal("TO")]));

        // -- Data (variables / lists) ---------------------------------
        m.insert("data_setvariableto", spec!([Slot { name: "VARIABLE", kind: SlotKind::Normal }], [normal("VALUE")]));
        m.insert(
            "data_changevariableby",
            spec!([Slot { name: "VARIABLE", kind: SlotKind::Normal }], [normal("VALUE")]),
        );
        m.insert("data_showvariable", spec!([Slot { name: "VARIABLE", kind: SlotKind::Normal }], []));
        m.insert("data_hidevariable", spec!([Slot { name: "VARIABLE", kind: SlotKind::Normal }], []));
        m.insert(
            "data_addtolist",
            spec!([Slot { name: "LIST", kind: SlotKind::Normal }], [normal("ITEM")]),
        );
        m.insert(
            "data_deleteoflist",
            spec!([Slot { name: "LIST", kind: SlotKind::Normal }], [normal("INDEX")]),
        );
        m.insert("data_deletealloflist", spec!([Slot { name: "LIST", kind: SlotKind::Normal }], []));
        m.insert(
            "data_insertatlist",
            spec!([Slot { name: "LIST", kind: SlotKind::Normal }], [normal("ITEM"), normal("INDEX")]),
        );
        m.insert(
            "data_replaceitemoflist",
            spec!([Slot { name: "LIST", kind: SlotKind::Normal }], [normal("INDEX"), normal("ITEM")]),
        );
        m.insert(
            "data_itemoflist",
            spec!([Slot { name: "LIST", kind: SlotKind::Normal }], [normal("INDEX")]),
        );
        m.insert(
            "data_itemnumoflist",
            spec!([Slot { name: "LIST", kind: SlotKind::Normal }], [normal("ITEM")]),
        );
        m.insert("data_lengthoflist", spec!([Slot { name: "LIST", kind: SlotKind::Normal }], []));
        m.insert(
            "data_listcontainsitem",
            spec!([Slot { name: "LIST", kind: SlotKind::Normal }], [normal("ITEM")]),
        );

        // -- Extensions -------------------------------------------------
        m.insert("pen_clear", spec!([], [], Extension::Pen));
        m.insert("pen_stamp", spec!([], [], Extension::Pen));
        m.insert("pen_pendown", spec!([], [], Extension::Pen));
        m.insert("pen_penup", spec!([], [], Extension::Pen));
        m.insert("pen_setpensizeto", spec!([], [normal("SIZE")], Extension::Pen));
        m.insert(
            "music_playdrumforbeats",
            spec!([], [normal("DRUM"), normal("BEATS")], Extension::Music),
        );
        m.insert(
            "videosensing_videotoggle",
            spec!([Slot { name: "VIDEO_STATE", kind: SlotKind::Normal }], [], Extension::VideoSensing),
        );
        m.insert("text2speech_speakandwait", spec!([], [normal("WORDS")], Extension::Text2Speech));
        m.insert(
            "translate_gettranslate",
            spec!([], [normal("WORDS"), normal("LANGUAGE")], Extension::Translate),
        );

        m
    };
}

pub fn lookup(opcode: &str) -> Option<&'static BlockSpec> {
    BLOCK_TYPES.get(opcode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_if_has_one_boolean_and_one_block_slot() {
        let spec = lookup("control_if").unwrap();
        assert_eq!(spec.inputs.len(), 2);
        assert_eq!(spec.inputs[0].kind, SlotKind::Boolean);
        assert_eq!(spec.inputs[1].kind, SlotKind::Block);
    }

    #[test]
    fn unknown_opcode_is_absent() {
        assert!(lookup("not_a_real_opcode").is_none());
    }

    #[test]
    fn pen_blocks_carry_the_pen_extension() {
        let spec = lookup("pen_clear").unwrap();
        assert_eq!(spec.extension, Some(Extension::Pen));
    }

    #[test]
    fn nullary_reporters_require_no_arguments() {
        let spec = lookup("motion_xposition").unwrap();
        assert_eq!(spec.required_count(), 0);
    }
}
