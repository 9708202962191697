use crate::errors::{ZmError, ZmResult};
use crate::zcpu::handlers as h;
use crate::zcpu::instructions::ZInstruction;
use crate::zcpu::ExecutionContext;
use crate::{ZMachineVersion, ZMachineVersion::*};

/// The five operand-count families instructions are tabulated under.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpcodeKind {
    ZeroOp,
    OneOp,
    TwoOp,
    VarOp,
    Ext,
}

bitflags! {
    /// Static properties of an opcode, fixed for a given version.
    ///
    /// `STORE`, `BRANCH` and `TEXT` drive the decoder: they say whether a
    /// store variable byte, a branch field or in-line encoded text follow
    /// the operands.
    pub struct OpcodeFlags: u8 {
        const STORE = 0b_0000_0001;
        const BRANCH = 0b_0000_0010;
        const TEXT = 0b_0000_0100;
        /// Reads two operand type bytes (call_vs2/call_vn2).
        const DOUBLE_VAR = 0b_0000_1000;
        const CALL = 0b_0001_0000;
        const JUMP = 0b_0010_0000;
    }
}

/// Executes one decoded instruction against the processor.
pub type OpcodeHandler = fn(&mut dyn ExecutionContext, &ZInstruction) -> ZmResult<()>;

/// One row of the opcode table.
#[derive(Copy, Clone)]
pub struct OpcodeEntry {
    pub name: &'static str,
    pub flags: OpcodeFlags,
    pub handler: OpcodeHandler,
}

fn entry(name: &'static str, flags: OpcodeFlags, handler: OpcodeHandler) -> Option<OpcodeEntry> {
    Some(OpcodeEntry {
        name,
        flags,
        handler,
    })
}

/// Resolves `(version, kind, number)` to the opcode's table row.
///
/// The table follows section 14 of the Standards Document; a miss means the
/// story file used an opcode its own version does not define.
pub fn lookup_opcode(
    version: ZMachineVersion,
    kind: OpcodeKind,
    number: u8,
) -> ZmResult<OpcodeEntry> {
    use self::OpcodeFlags as F;
    use self::OpcodeKind::*;

    let found = match (kind, number) {
        (TwoOp, 1) => entry("je", F::BRANCH, h::je),
        (TwoOp, 2) => entry("jl", F::BRANCH, h::jl),
        (TwoOp, 3) => entry("jg", F::BRANCH, h::jg),
        (TwoOp, 4) => entry("dec_chk", F::BRANCH, h::dec_chk),
        (TwoOp, 5) => entry("inc_chk", F::BRANCH, h::inc_chk),
        (TwoOp, 6) => entry("jin", F::BRANCH, h::jin),
        (TwoOp, 7) => entry("test", F::BRANCH, h::test),
        (TwoOp, 8) => entry("or", F::STORE, h::or),
        (TwoOp, 9) => entry("and", F::STORE, h::and),
        (TwoOp, 10) => entry("test_attr", F::BRANCH, h::test_attr),
        (TwoOp, 11) => entry("set_attr", F::empty(), h::set_attr),
        (TwoOp, 12) => entry("clear_attr", F::empty(), h::clear_attr),
        (TwoOp, 13) => entry("store", F::empty(), h::store),
        (TwoOp, 14) => entry("insert_obj", F::empty(), h::insert_obj),
        (TwoOp, 15) => entry("loadw", F::STORE, h::loadw),
        (TwoOp, 16) => entry("loadb", F::STORE, h::loadb),
        (TwoOp, 17) => entry("get_prop", F::STORE, h::get_prop),
        (TwoOp, 18) => entry("get_prop_addr", F::STORE, h::get_prop_addr),
        (TwoOp, 19) => entry("get_next_prop", F::STORE, h::get_next_prop),
        (TwoOp, 20) => entry("add", F::STORE, h::add),
        (TwoOp, 21) => entry("sub", F::STORE, h::sub),
        (TwoOp, 22) => entry("mul", F::STORE, h::mul),
        (TwoOp, 23) => entry("div", F::STORE, h::div),
        (TwoOp, 24) => entry("mod", F::STORE, h::modulo),
        (TwoOp, 25) if version >= V4 => entry("call_2s", F::STORE | F::CALL, h::call),
        (TwoOp, 26) if version >= V5 => entry("call_2n", F::CALL, h::call),
        (TwoOp, 27) if version >= V5 => entry("set_colour", F::empty(), h::set_colour),
        (TwoOp, 28) if version >= V5 => entry("throw", F::empty(), h::throw),

        (OneOp, 0) => entry("jz", F::BRANCH, h::jz),
        (OneOp, 1) => entry("get_sibling", F::STORE | F::BRANCH, h::get_sibling),
        (OneOp, 2) => entry("get_child", F::STORE | F::BRANCH, h::get_child),
        (OneOp, 3) => entry("get_parent", F::STORE, h::get_parent),
        (OneOp, 4) => entry("get_prop_len", F::STORE, h::get_prop_len),
        (OneOp, 5) => entry("inc", F::empty(), h::inc),
        (OneOp, 6) => entry("dec", F::empty(), h::dec),
        (OneOp, 7) => entry("print_addr", F::empty(), h::print_addr),
        (OneOp, 8) if version >= V4 => entry("call_1s", F::STORE | F::CALL, h::call),
        (OneOp, 9) => entry("remove_obj", F::empty(), h::remove_obj),
        (OneOp, 10) => entry("print_obj", F::empty(), h::print_obj),
        (OneOp, 11) => entry("ret", F::empty(), h::ret),
        (OneOp, 12) => entry("jump", F::JUMP, h::jump),
        (OneOp, 13) => entry("print_paddr", F::empty(), h::print_paddr),
        (OneOp, 14) => entry("load", F::STORE, h::load),
        (OneOp, 15) if version >= V5 => entry("call_1n", F::CALL, h::call),
        (OneOp, 15) => entry("not", F::STORE, h::not),

        (ZeroOp, 0) => entry("rtrue", F::empty(), h::rtrue),
        (ZeroOp, 1) => entry("rfalse", F::empty(), h::rfalse),
        (ZeroOp, 2) => entry("print", F::TEXT, h::print),
        (ZeroOp, 3) => entry("print_ret", F::TEXT, h::print_ret),
        (ZeroOp, 4) => entry("nop", F::empty(), h::nop),
        (ZeroOp, 5) if version <= V3 => entry("save", F::BRANCH, h::unimplemented),
        (ZeroOp, 5) if version == V4 => entry("save", F::STORE, h::unimplemented),
        (ZeroOp, 6) if version <= V3 => entry("restore", F::BRANCH, h::unimplemented),
        (ZeroOp, 6) if version == V4 => entry("restore", F::STORE, h::unimplemented),
        (ZeroOp, 7) => entry("restart", F::empty(), h::restart),
        (ZeroOp, 8) => entry("ret_popped", F::empty(), h::ret_popped),
        (ZeroOp, 9) if version >= V5 => entry("catch", F::STORE, h::catch_frame),
        (ZeroOp, 9) => entry("pop", F::empty(), h::pop),
        (ZeroOp, 10) => entry("quit", F::empty(), h::quit),
        (ZeroOp, 11) => entry("new_line", F::empty(), h::new_line),
        (ZeroOp, 12) if version == V3 => entry("show_status", F::empty(), h::show_status),
        (ZeroOp, 13) if version >= V3 => entry("verify", F::BRANCH, h::verify),
        (ZeroOp, 15) if version >= V5 => entry("piracy", F::BRANCH, h::piracy),

        (VarOp, 0) if version >= V4 => entry("call_vs", F::STORE | F::CALL, h::call),
        (VarOp, 0) => entry("call", F::STORE | F::CALL, h::call),
        (VarOp, 1) => entry("storew", F::empty(), h::storew),
        (VarOp, 2) => entry("storeb", F::empty(), h::storeb),
        (VarOp, 3) => entry("put_prop", F::empty(), h::put_prop),
        (VarOp, 4) if version >= V5 => entry("aread", F::STORE, h::read),
        (VarOp, 4) => entry("sread", F::empty(), h::read),
        (VarOp, 5) => entry("print_char", F::empty(), h::print_char),
        (VarOp, 6) => entry("print_num", F::empty(), h::print_num),
        (VarOp, 7) => entry("random", F::STORE, h::random),
        (VarOp, 8) => entry("push", F::empty(), h::push),
        (VarOp, 9) if version == V6 => entry("pull", F::STORE, h::pull),
        (VarOp, 9) => entry("pull", F::empty(), h::pull),
        (VarOp, 10) if version >= V3 => entry("split_window", F::empty(), h::split_window),
        (VarOp, 11) if version >= V3 => entry("set_window", F::empty(), h::set_window),
        (VarOp, 12) if version >= V4 => {
            entry("call_vs2", F::STORE | F::CALL | F::DOUBLE_VAR, h::call)
        }
        (VarOp, 13) if version >= V4 => entry("erase_window", F::empty(), h::erase_window),
        (VarOp, 14) if version >= V4 => entry("erase_line", F::empty(), h::erase_line),
        (VarOp, 15) if version >= V4 => entry("set_cursor", F::empty(), h::set_cursor),
        (VarOp, 16) if version >= V4 => entry("get_cursor", F::empty(), h::get_cursor),
        (VarOp, 17) if version >= V4 => entry("set_text_style", F::empty(), h::set_text_style),
        (VarOp, 18) if version >= V4 => entry("buffer_mode", F::empty(), h::buffer_mode),
        (VarOp, 19) if version >= V3 => entry("output_stream", F::empty(), h::unimplemented),
        (VarOp, 20) if version >= V3 => entry("input_stream", F::empty(), h::unimplemented),
        (VarOp, 21) if version >= V3 => entry("sound_effect", F::empty(), h::unimplemented),
        (VarOp, 22) if version >= V4 => entry("read_char", F::STORE, h::read_char),
        (VarOp, 23) if version >= V4 => entry("scan_table", F::STORE | F::BRANCH, h::scan_table),
        (VarOp, 24) if version >= V5 => entry("not", F::STORE, h::not),
        (VarOp, 25) if version >= V5 => entry("call_vn", F::CALL, h::call),
        (VarOp, 26) if version >= V5 => entry("call_vn2", F::CALL | F::DOUBLE_VAR, h::call),
        (VarOp, 27) if version >= V5 => entry("tokenise", F::empty(), h::unimplemented),
        (VarOp, 28) if version >= V5 => entry("encode_text", F::empty(), h::unimplemented),
        (VarOp, 29) if version >= V5 => entry("copy_table", F::empty(), h::copy_table),
        (VarOp, 30) if version >= V5 => entry("print_table", F::empty(), h::print_table),
        (VarOp, 31) if version >= V5 => {
            entry("check_arg_count", F::BRANCH, h::check_arg_count)
        }

        // the extended table only exists from V5 (R14)
        (Ext, 0) => entry("save", F::STORE, h::unimplemented),
        (Ext, 1) => entry("restore", F::STORE, h::unimplemented),
        (Ext, 2) => entry("log_shift", F::STORE, h::log_shift),
        (Ext, 3) => entry("art_shift", F::STORE, h::art_shift),
        (Ext, 4) => entry("set_font", F::STORE, h::set_font),
        (Ext, 5) if version == V6 => entry("draw_picture", F::empty(), h::unimplemented),
        (Ext, 6) if version == V6 => entry("picture_data", F::BRANCH, h::unimplemented),
        (Ext, 7) if version == V6 => entry("erase_picture", F::empty(), h::unimplemented),
        (Ext, 8) if version == V6 => entry("set_margins", F::empty(), h::unimplemented),
        (Ext, 9) => entry("save_undo", F::STORE, h::unimplemented),
        (Ext, 10) => entry("restore_undo", F::STORE, h::unimplemented),
        (Ext, 11) => entry("print_unicode", F::empty(), h::print_unicode),
        (Ext, 12) => entry("check_unicode", F::STORE, h::check_unicode),
        (Ext, 13) => entry("set_true_colour", F::empty(), h::unimplemented),
        (Ext, 16) if version == V6 => entry("move_window", F::empty(), h::unimplemented),
        (Ext, 17) if version == V6 => entry("window_size", F::empty(), h::unimplemented),
        (Ext, 18) if version == V6 => entry("window_style", F::empty(), h::unimplemented),
        (Ext, 19) if version == V6 => entry("get_wind_prop", F::STORE, h::unimplemented),
        (Ext, 20) if version == V6 => entry("scroll_window", F::empty(), h::unimplemented),
        (Ext, 21) if version == V6 => entry("pop_stack", F::empty(), h::unimplemented),
        (Ext, 22) if version == V6 => entry("read_mouse", F::empty(), h::unimplemented),
        (Ext, 23) if version == V6 => entry("mouse_window", F::empty(), h::unimplemented),
        (Ext, 24) if version == V6 => entry("push_stack", F::BRANCH, h::unimplemented),
        (Ext, 25) if version == V6 => entry("put_wind_prop", F::empty(), h::unimplemented),
        (Ext, 26) if version == V6 => entry("print_form", F::empty(), h::unimplemented),
        (Ext, 27) if version == V6 => entry("make_menu", F::BRANCH, h::unimplemented),
        (Ext, 28) if version == V6 => entry("picture_table", F::empty(), h::unimplemented),

        _ => None,
    };
    found.ok_or(ZmError::DecodeUnknownOpcode {
        version,
        kind,
        number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_branch_and_text_flags_match_the_standard() {
        let je = lookup_opcode(V3, OpcodeKind::TwoOp, 1).unwrap();
        assert_eq!(je.name, "je");
        assert!(je.flags.contains(OpcodeFlags::BRANCH));
        assert!(!je.flags.contains(OpcodeFlags::STORE));

        let call = lookup_opcode(V5, OpcodeKind::VarOp, 0).unwrap();
        assert_eq!(call.name, "call_vs");
        assert!(call.flags.contains(OpcodeFlags::STORE | OpcodeFlags::CALL));

        let print = lookup_opcode(V3, OpcodeKind::ZeroOp, 2).unwrap();
        assert!(print.flags.contains(OpcodeFlags::TEXT));

        let get_sibling = lookup_opcode(V3, OpcodeKind::OneOp, 1).unwrap();
        assert!(get_sibling
            .flags
            .contains(OpcodeFlags::STORE | OpcodeFlags::BRANCH));
    }

    #[test]
    fn double_variable_calls_are_flagged() {
        for (kind, number) in &[(OpcodeKind::VarOp, 12), (OpcodeKind::VarOp, 26)] {
            let opcode = lookup_opcode(V5, *kind, *number).unwrap();
            assert!(opcode.flags.contains(OpcodeFlags::DOUBLE_VAR), "{}", opcode.name);
        }
    }

    #[test]
    fn one_op_15_flips_from_not_to_call_1n_at_v5() {
        assert_eq!(lookup_opcode(V4, OpcodeKind::OneOp, 15).unwrap().name, "not");
        assert_eq!(
            lookup_opcode(V5, OpcodeKind::OneOp, 15).unwrap().name,
            "call_1n"
        );
    }

    #[test]
    fn zero_op_9_flips_from_pop_to_catch_at_v5() {
        assert_eq!(lookup_opcode(V4, OpcodeKind::ZeroOp, 9).unwrap().name, "pop");
        assert_eq!(
            lookup_opcode(V5, OpcodeKind::ZeroOp, 9).unwrap().name,
            "catch"
        );
    }

    #[test]
    fn zero_op_save_is_gone_from_v5() {
        assert!(lookup_opcode(V3, OpcodeKind::ZeroOp, 5).is_ok());
        assert!(lookup_opcode(V4, OpcodeKind::ZeroOp, 5)
            .unwrap()
            .flags
            .contains(OpcodeFlags::STORE));
        assert!(matches!(
            lookup_opcode(V5, OpcodeKind::ZeroOp, 5),
            Err(ZmError::DecodeUnknownOpcode { .. })
        ));
    }

    #[test]
    fn missing_table_entries_are_decode_errors() {
        assert!(matches!(
            lookup_opcode(V3, OpcodeKind::TwoOp, 0),
            Err(ZmError::DecodeUnknownOpcode { .. })
        ));
        assert!(matches!(
            lookup_opcode(V3, OpcodeKind::TwoOp, 25),
            Err(ZmError::DecodeUnknownOpcode { .. })
        ));
    }
}
