use crate::bitwise::Bits;

use super::opcode::OpcodeTable;

fn format_src2(op: u32) -> String {
    let src2 = op.get_bits(0..=15);
    if src2 >= 0xFFE0 {
        format!("r{}", src2 & 31)
    } else {
        format!("${src2:X}")
    }
}

/// One instruction, in the `mnemonic[.c] dst,src1,src2` form.
pub fn disassemble(pc: u32, op: u32) -> String {
    let entry = OpcodeTable::shared().lookup(op);
    let opcode = op >> 27;
    let dst = op.get_bits(22..=26);
    let src1 = op.get_bits(16..=20);
    let suffix = if op.get_bit(21) { ".c" } else { "" };
    let target = pc.wrapping_add(op.get_bits(0..=21).sign_extended(22) << 2);
    let name = format!("{}{suffix}", entry.mnemonic);
    let src2 = format_src2(op);

    match opcode {
        0 | 31 => entry.mnemonic.to_string(),
        1 => format!("bsr    r{dst},${target:08X}"),
        2 if entry.mnemonic == "illegal" => format!("dc.l   ${op:08X}"),
        2 => format!("{:<7}${target:08X}", entry.mnemonic),
        3 | 16 | 19 | 20 => format!("{name:<7}r{dst},[r{src1}+{src2}*4]"),
        4 | 17 | 18 => format!("{name:<7}r{dst},[r{src1}+{src2}*2]"),
        21..=23 => format!("{name:<7}r{dst},[r{src1}+{src2}]"),
        28 => format!("getps  r{dst}"),
        29 => format!("putps  {src2}"),
        30 => format!("{name:<7}r{dst},r{src1}+{src2}*4"),
        _ => format!("{name:<7}r{dst},r{src1},{src2}"),
    }
}
