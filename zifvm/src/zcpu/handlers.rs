//! Per-opcode semantics over the `ExecutionContext` capability.
//!
//! Handlers read operands strictly left to right: `Stack` operands pop, so
//! the order is observable by the story.
use log::debug;

use crate::errors::{ZmError, ZmResult};
use crate::zcpu::instructions::ZInstruction;
use crate::zcpu::{signed, unsigned, ExecutionContext, ONE, ZERO};
use crate::zscreen::{ZColor, ZTextStyle};

type Ctx<'a> = &'a mut dyn ExecutionContext;

pub fn je(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let reference = ctx.operand_value(instruction, 0)?;
    let mut matched = false;
    for index in 1..instruction.operands.len() {
        if ctx.operand_value(instruction, index)? == reference {
            matched = true;
        }
    }
    ctx.branch(instruction, matched)
}

pub fn jl(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let a = signed(ctx.operand_value(instruction, 0)?);
    let b = signed(ctx.operand_value(instruction, 1)?);
    ctx.branch(instruction, a < b)
}

pub fn jg(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let a = signed(ctx.operand_value(instruction, 0)?);
    let b = signed(ctx.operand_value(instruction, 1)?);
    ctx.branch(instruction, a > b)
}

pub fn dec_chk(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let variable = ctx.operand_variable(instruction, 0)?;
    let threshold = signed(ctx.operand_value(instruction, 1)?);
    let value = signed(ctx.read_variable_indirectly(variable)?).wrapping_sub(1);
    ctx.write_variable_indirectly(variable, unsigned(value))?;
    ctx.branch(instruction, value < threshold)
}

pub fn inc_chk(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let variable = ctx.operand_variable(instruction, 0)?;
    let threshold = signed(ctx.operand_value(instruction, 1)?);
    let value = signed(ctx.read_variable_indirectly(variable)?).wrapping_add(1);
    ctx.write_variable_indirectly(variable, unsigned(value))?;
    ctx.branch(instruction, value > threshold)
}

pub fn jin(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let object = ctx.operand_value(instruction, 0)?;
    let parent = ctx.operand_value(instruction, 1)?;
    let actual = ctx.object_parent(object)?;
    ctx.branch(instruction, actual == parent)
}

pub fn test(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let bitmap = ctx.operand_value(instruction, 0)?;
    let flags = ctx.operand_value(instruction, 1)?;
    ctx.branch(instruction, bitmap & flags == flags)
}

pub fn or(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let a = ctx.operand_value(instruction, 0)?;
    let b = ctx.operand_value(instruction, 1)?;
    ctx.store_result(instruction, a | b)
}

pub fn and(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let a = ctx.operand_value(instruction, 0)?;
    let b = ctx.operand_value(instruction, 1)?;
    ctx.store_result(instruction, a & b)
}

pub fn test_attr(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let object = ctx.operand_value(instruction, 0)?;
    let attribute = ctx.operand_value(instruction, 1)?;
    let on = ctx.object_test_attribute(object, attribute)?;
    ctx.branch(instruction, on)
}

pub fn set_attr(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let object = ctx.operand_value(instruction, 0)?;
    let attribute = ctx.operand_value(instruction, 1)?;
    ctx.object_set_attribute(object, attribute, true)
}

pub fn clear_attr(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let object = ctx.operand_value(instruction, 0)?;
    let attribute = ctx.operand_value(instruction, 1)?;
    ctx.object_set_attribute(object, attribute, false)
}

pub fn store(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let variable = ctx.operand_variable(instruction, 0)?;
    let value = ctx.operand_value(instruction, 1)?;
    ctx.write_variable_indirectly(variable, value)
}

pub fn insert_obj(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let object = ctx.operand_value(instruction, 0)?;
    let destination = ctx.operand_value(instruction, 1)?;
    ctx.object_insert(object, destination)
}

pub fn loadw(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let array = ctx.operand_value(instruction, 0)? as u32;
    let index = ctx.operand_value(instruction, 1)? as u32;
    let value = ctx.read_word(array + 2 * index)?;
    ctx.store_result(instruction, value)
}

pub fn loadb(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let array = ctx.operand_value(instruction, 0)? as u32;
    let index = ctx.operand_value(instruction, 1)? as u32;
    let value = ctx.read_byte(array + index)?;
    ctx.store_result(instruction, value as u16)
}

pub fn get_prop(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let object = ctx.operand_value(instruction, 0)?;
    let property = ctx.operand_value(instruction, 1)?;
    let value = ctx.property_value(object, property)?;
    ctx.store_result(instruction, value)
}

pub fn get_prop_addr(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let object = ctx.operand_value(instruction, 0)?;
    let property = ctx.operand_value(instruction, 1)?;
    let address = ctx.property_address(object, property)?;
    ctx.store_result(instruction, address)
}

pub fn get_next_prop(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let object = ctx.operand_value(instruction, 0)?;
    let property = ctx.operand_value(instruction, 1)?;
    let next = ctx.property_next(object, property)?;
    ctx.store_result(instruction, next)
}

pub fn add(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let a = signed(ctx.operand_value(instruction, 0)?);
    let b = signed(ctx.operand_value(instruction, 1)?);
    ctx.store_result(instruction, unsigned(a.wrapping_add(b)))
}

pub fn sub(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let a = signed(ctx.operand_value(instruction, 0)?);
    let b = signed(ctx.operand_value(instruction, 1)?);
    ctx.store_result(instruction, unsigned(a.wrapping_sub(b)))
}

pub fn mul(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let a = signed(ctx.operand_value(instruction, 0)?);
    let b = signed(ctx.operand_value(instruction, 1)?);
    ctx.store_result(instruction, unsigned(a.wrapping_mul(b)))
}

pub fn div(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let a = signed(ctx.operand_value(instruction, 0)?);
    let b = signed(ctx.operand_value(instruction, 1)?);
    if b == 0 {
        return Err(ZmError::DivisionByZero);
    }
    ctx.store_result(instruction, unsigned(a.wrapping_div(b)))
}

pub fn modulo(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let a = signed(ctx.operand_value(instruction, 0)?);
    let b = signed(ctx.operand_value(instruction, 1)?);
    if b == 0 {
        return Err(ZmError::DivisionByZero);
    }
    ctx.store_result(instruction, unsigned(a.wrapping_rem(b)))
}

/// Shared by the whole `call_*` family: the decoder already knows which
/// variants store, so the instruction's store variable says it all.
pub fn call(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let packed = ctx.operand_value(instruction, 0)?;
    let mut arguments = Vec::with_capacity(instruction.operands.len().saturating_sub(1));
    for index in 1..instruction.operands.len() {
        arguments.push(ctx.operand_value(instruction, index)?);
    }
    ctx.call_routine(packed, &arguments, instruction.store_variable)
}

pub fn set_colour(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let foreground = ctx.operand_value(instruction, 0)?;
    let background = ctx.operand_value(instruction, 1)?;
    match ZColor::from_code(foreground) {
        Some(color) => ctx.screen().set_foreground_color(color),
        None => debug!("set_colour: unknown foreground code {}", foreground),
    }
    match ZColor::from_code(background) {
        Some(color) => ctx.screen().set_background_color(color),
        None => debug!("set_colour: unknown background code {}", background),
    }
    Ok(())
}

pub fn throw(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let value = ctx.operand_value(instruction, 0)?;
    let frame = ctx.operand_value(instruction, 1)?;
    ctx.throw_to_frame(frame as usize, value)
}

pub fn jz(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let value = ctx.operand_value(instruction, 0)?;
    ctx.branch(instruction, value == 0)
}

pub fn get_sibling(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let object = ctx.operand_value(instruction, 0)?;
    let sibling = ctx.object_sibling(object)?;
    ctx.store_result(instruction, sibling)?;
    ctx.branch(instruction, sibling != 0)
}

pub fn get_child(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let object = ctx.operand_value(instruction, 0)?;
    let child = ctx.object_child(object)?;
    ctx.store_result(instruction, child)?;
    ctx.branch(instruction, child != 0)
}

pub fn get_parent(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let object = ctx.operand_value(instruction, 0)?;
    let parent = ctx.object_parent(object)?;
    ctx.store_result(instruction, parent)
}

pub fn get_prop_len(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let address = ctx.operand_value(instruction, 0)?;
    let length = ctx.property_length(address)?;
    ctx.store_result(instruction, length)
}

pub fn inc(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let variable = ctx.operand_variable(instruction, 0)?;
    let value = signed(ctx.read_variable_indirectly(variable)?).wrapping_add(1);
    ctx.write_variable_indirectly(variable, unsigned(value))
}

pub fn dec(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let variable = ctx.operand_variable(instruction, 0)?;
    let value = signed(ctx.read_variable_indirectly(variable)?).wrapping_sub(1);
    ctx.write_variable_indirectly(variable, unsigned(value))
}

pub fn print_addr(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let address = ctx.operand_value(instruction, 0)?;
    let text = ctx.decode_z_text_at(address as u32)?;
    ctx.print(&text)
}

pub fn remove_obj(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let object = ctx.operand_value(instruction, 0)?;
    ctx.object_remove(object)
}

pub fn print_obj(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let object = ctx.operand_value(instruction, 0)?;
    let name = ctx.object_short_name(object)?;
    ctx.print(&name)
}

pub fn ret(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let value = ctx.operand_value(instruction, 0)?;
    ctx.return_value(value)
}

pub fn jump(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let offset = signed(ctx.operand_value(instruction, 0)?);
    ctx.jump_by(offset);
    Ok(())
}

pub fn print_paddr(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let packed = ctx.operand_value(instruction, 0)?;
    let address = ctx.unpack_string_address(packed);
    let text = ctx.decode_z_text_at(address)?;
    ctx.print(&text)
}

pub fn load(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let variable = ctx.operand_variable(instruction, 0)?;
    let value = ctx.read_variable_indirectly(variable)?;
    ctx.store_result(instruction, value)
}

pub fn not(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let value = ctx.operand_value(instruction, 0)?;
    ctx.store_result(instruction, !value)
}

pub fn rtrue(ctx: Ctx, _instruction: &ZInstruction) -> ZmResult<()> {
    ctx.return_value(ONE)
}

pub fn rfalse(ctx: Ctx, _instruction: &ZInstruction) -> ZmResult<()> {
    ctx.return_value(ZERO)
}

pub fn print(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let words = instruction.z_text.as_deref().unwrap_or(&[]);
    let text = ctx.decode_z_words(words)?;
    ctx.print(&text)
}

pub fn print_ret(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let words = instruction.z_text.as_deref().unwrap_or(&[]);
    let text = ctx.decode_z_words(words)?;
    ctx.print(&text)?;
    ctx.print("\n")?;
    ctx.return_value(ONE)
}

pub fn nop(_ctx: Ctx, _instruction: &ZInstruction) -> ZmResult<()> {
    Ok(())
}

pub fn restart(ctx: Ctx, _instruction: &ZInstruction) -> ZmResult<()> {
    ctx.restart()
}

pub fn ret_popped(ctx: Ctx, _instruction: &ZInstruction) -> ZmResult<()> {
    let value = ctx.pop_eval()?;
    ctx.return_value(value)
}

pub fn pop(ctx: Ctx, _instruction: &ZInstruction) -> ZmResult<()> {
    ctx.pop_eval()?;
    Ok(())
}

/// `catch` stores the current frame count; `throw` later unwinds back to it.
pub fn catch_frame(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let frames = ctx.frame_count() as u16;
    ctx.store_result(instruction, frames)
}

pub fn quit(ctx: Ctx, _instruction: &ZInstruction) -> ZmResult<()> {
    ctx.quit();
    Ok(())
}

pub fn new_line(ctx: Ctx, _instruction: &ZInstruction) -> ZmResult<()> {
    ctx.print("\n")
}

pub fn show_status(ctx: Ctx, _instruction: &ZInstruction) -> ZmResult<()> {
    ctx.show_status()
}

pub fn verify(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let matches = ctx.verify_checksum()?;
    ctx.branch(instruction, matches)
}

/// R15 suggests interpreters are free to be gullible here.
pub fn piracy(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    ctx.branch(instruction, true)
}

pub fn storew(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let array = ctx.operand_value(instruction, 0)? as u32;
    let index = ctx.operand_value(instruction, 1)? as u32;
    let value = ctx.operand_value(instruction, 2)?;
    ctx.write_word(array + 2 * index, value)
}

pub fn storeb(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let array = ctx.operand_value(instruction, 0)? as u32;
    let index = ctx.operand_value(instruction, 1)? as u32;
    let value = ctx.operand_value(instruction, 2)?;
    ctx.write_byte(array + index, value as u8)
}

pub fn put_prop(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let object = ctx.operand_value(instruction, 0)?;
    let property = ctx.operand_value(instruction, 1)?;
    let value = ctx.operand_value(instruction, 2)?;
    ctx.property_put(object, property, value)
}

/// `sread`/`aread`: suspend until the host delivers a line of input. The
/// optional V4+ time/routine operands are read but not timed.
pub fn read(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let text_buffer = ctx.operand_value(instruction, 0)? as u32;
    let parse_buffer = if instruction.operands.len() > 1 {
        ctx.operand_value(instruction, 1)? as u32
    } else {
        0
    };
    ctx.request_line_input(text_buffer, parse_buffer, instruction.store_variable)
}

pub fn print_char(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let code = ctx.operand_value(instruction, 0)?;
    ctx.print_zscii(code)
}

pub fn print_num(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let value = signed(ctx.operand_value(instruction, 0)?);
    ctx.print(&value.to_string())
}

/// `random`: positive ranges draw uniformly from [1, range]; zero or negative
/// ranges reseed (predictably for negative, from entropy for zero) and
/// store 0.
pub fn random(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let range = signed(ctx.operand_value(instruction, 0)?);
    if range > 0 {
        let value = ctx.next_random(range as u16);
        ctx.store_result(instruction, value)
    } else {
        ctx.randomize(range.unsigned_abs());
        ctx.store_result(instruction, 0)
    }
}

pub fn push(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let value = ctx.operand_value(instruction, 0)?;
    ctx.push_eval(value)
}

pub fn pull(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    if instruction.store_variable.is_some() {
        // V6 stores instead of taking a variable reference
        let value = ctx.pop_eval()?;
        return ctx.store_result(instruction, value);
    }
    let variable = ctx.operand_variable(instruction, 0)?;
    let value = ctx.pop_eval()?;
    ctx.write_variable_indirectly(variable, value)
}

pub fn split_window(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let height = ctx.operand_value(instruction, 0)?;
    if height == 0 {
        ctx.screen().unsplit();
    } else {
        ctx.screen().split(height);
    }
    Ok(())
}

pub fn set_window(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let window = ctx.operand_value(instruction, 0)?;
    ctx.screen().set_window(window);
    Ok(())
}

pub fn erase_window(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let window = signed(ctx.operand_value(instruction, 0)?);
    match window {
        -1 => ctx.screen().clear_all(true),
        -2 => ctx.screen().clear_all(false),
        window => ctx.screen().clear_window(window),
    }
    Ok(())
}

pub fn erase_line(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let value = ctx.operand_value(instruction, 0)?;
    debug!("erase_line {} left to the host screen", value);
    Ok(())
}

pub fn set_cursor(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let line = ctx.operand_value(instruction, 0)?;
    let column = ctx.operand_value(instruction, 1)?;
    ctx.screen().set_cursor(line, column);
    Ok(())
}

pub fn get_cursor(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let array = ctx.operand_value(instruction, 0)? as u32;
    let (line, column) = ctx.screen().cursor();
    ctx.write_word(array, line)?;
    ctx.write_word(array + 2, column)
}

pub fn set_text_style(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let style = ctx.operand_value(instruction, 0)?;
    ctx.screen()
        .set_text_style(ZTextStyle::from_bits_truncate(style as u8));
    Ok(())
}

pub fn buffer_mode(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let mode = ctx.operand_value(instruction, 0)?;
    debug!("buffer_mode {} left to the host screen", mode);
    Ok(())
}

pub fn read_char(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    // operand 0 is always 1 (the keyboard); time/routine are not timed
    let _device = ctx.operand_value(instruction, 0)?;
    ctx.request_char_input(instruction.store_variable)
}

pub fn scan_table(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let target = ctx.operand_value(instruction, 0)?;
    let table = ctx.operand_value(instruction, 1)? as u32;
    let length = ctx.operand_value(instruction, 2)?;
    let form = if instruction.operands.len() > 3 {
        ctx.operand_value(instruction, 3)?
    } else {
        0x82
    };
    let words = form & 0x80 != 0;
    let field_length = (form & 0x7F) as u32;
    if field_length == 0 {
        return Err(ZmError::IllegalState("scan_table with field length 0".into()));
    }
    let mut address = table;
    let mut found = 0u16;
    for _ in 0..length {
        let value = if words {
            ctx.read_word(address)?
        } else {
            ctx.read_byte(address)? as u16
        };
        if value == target {
            found = address as u16;
            break;
        }
        address += field_length;
    }
    ctx.store_result(instruction, found)?;
    ctx.branch(instruction, found != 0)
}

/// `copy_table`: zero the target when `second` is 0, copy forwards when the
/// size is negative, otherwise copy corruption-free (R15).
pub fn copy_table(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let first = ctx.operand_value(instruction, 0)? as u32;
    let second = ctx.operand_value(instruction, 1)? as u32;
    let size = signed(ctx.operand_value(instruction, 2)?);
    if second == 0 {
        for offset in 0..size.unsigned_abs() as u32 {
            ctx.write_byte(first + offset, 0)?;
        }
        return Ok(());
    }
    if size < 0 {
        for offset in 0..size.unsigned_abs() as u32 {
            let byte = ctx.read_byte(first + offset)?;
            ctx.write_byte(second + offset, byte)?;
        }
        return Ok(());
    }
    let mut buffer = Vec::with_capacity(size as usize);
    for offset in 0..size as u32 {
        buffer.push(ctx.read_byte(first + offset)?);
    }
    for (offset, byte) in buffer.into_iter().enumerate() {
        ctx.write_byte(second + offset as u32, byte)?;
    }
    Ok(())
}

pub fn print_table(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let text = ctx.operand_value(instruction, 0)? as u32;
    let width = ctx.operand_value(instruction, 1)? as u32;
    let height = if instruction.operands.len() > 2 {
        ctx.operand_value(instruction, 2)?
    } else {
        1
    };
    let skip = if instruction.operands.len() > 3 {
        ctx.operand_value(instruction, 3)? as u32
    } else {
        0
    };
    let mut address = text;
    for row in 0..height {
        if row > 0 {
            ctx.print("\n")?;
        }
        for _ in 0..width {
            let code = ctx.read_byte(address)? as u16;
            ctx.print_zscii(code)?;
            address += 1;
        }
        address += skip;
    }
    Ok(())
}

pub fn check_arg_count(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let argument = ctx.operand_value(instruction, 0)?;
    let provided = ctx.argument_count()? as u16;
    ctx.branch(instruction, argument <= provided)
}

/// Positive places shift left, negative shift right; `log_shift` shifts in
/// zeroes, `art_shift` keeps the sign.
fn shift(value: u16, places: i16, arithmetic: bool) -> u16 {
    if places >= 16 {
        return 0;
    }
    if places >= 0 {
        return value.wrapping_shl(places as u32);
    }
    let by = places.unsigned_abs() as u32;
    if arithmetic {
        if by >= 16 {
            return if value & 0x8000 != 0 { 0xFFFF } else { 0 };
        }
        ((value as i16) >> by) as u16
    } else {
        if by >= 16 {
            return 0;
        }
        value >> by
    }
}

pub fn log_shift(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let value = ctx.operand_value(instruction, 0)?;
    let places = signed(ctx.operand_value(instruction, 1)?);
    ctx.store_result(instruction, shift(value, places, false))
}

pub fn art_shift(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let value = ctx.operand_value(instruction, 0)?;
    let places = signed(ctx.operand_value(instruction, 1)?);
    ctx.store_result(instruction, shift(value, places, true))
}

/// No alternative fonts: store 0, "font unchanged/unavailable".
pub fn set_font(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let _font = ctx.operand_value(instruction, 0)?;
    ctx.store_result(instruction, 0)
}

pub fn print_unicode(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let code = ctx.operand_value(instruction, 0)?;
    match char::from_u32(code as u32) {
        Some(ch) => {
            ctx.screen().print_char(ch);
            Ok(())
        }
        None => Err(ZmError::StringInvalidZSCIICharacterCode(code)),
    }
}

pub fn check_unicode(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let code = ctx.operand_value(instruction, 0)?;
    // bit 0: can print it; input is line-based so bit 1 stays clear
    let answer = match char::from_u32(code as u32) {
        Some(_) => 1,
        None => 0,
    };
    ctx.store_result(instruction, answer)
}

/// Table rows whose feature set is out of scope (saves, undo, sound,
/// stream redirection, V6 windowing).
pub fn unimplemented(ctx: Ctx, instruction: &ZInstruction) -> ZmResult<()> {
    let opcode = instruction.opcode(ctx.version())?;
    Err(ZmError::IllegalState(format!(
        "unimplemented opcode {} at {:#X}",
        opcode.name, instruction.address
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_behave_by_direction_and_kind() {
        assert_eq!(shift(0x0001, 3, false), 0x0008);
        assert_eq!(shift(0x8000, -15, false), 0x0001);
        assert_eq!(shift(0x8000, -15, true), 0xFFFF);
        assert_eq!(shift(0x4000, -14, true), 0x0001);
        assert_eq!(shift(0xFFFF, 16, false), 0);
        assert_eq!(shift(0x0001, 15, true), 0x8000);
    }
}
