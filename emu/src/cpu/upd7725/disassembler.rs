use crate::bitwise::Bits;

const SOURCES: [&str; 16] = [
    "trb", "a", "b", "tr", "dp", "rp", "ro", "sgn", "dr", "drnf", "sr", "sim", "sil", "k", "l",
    "mem",
];

const DESTINATIONS: [&str; 16] = [
    "non", "a", "b", "tr", "dp", "rp", "dr", "sr", "sol", "som", "k", "klr", "klm", "l", "trb",
    "mem",
];

const P_SELECT: [&str; 4] = ["ram", "idb", "m", "n"];

const ALU: [&str; 16] = [
    "nop", "or", "and", "xor", "sub", "add", "sbb", "adc", "dec", "inc", "cmp", "shr1", "shl1",
    "shl2", "shl4", "xchg",
];

const FLAGS: [&str; 6] = ["c", "z", "ov0", "ov1", "s0", "s1"];

fn branch_name(brch: u32) -> Option<String> {
    let name = match brch {
        0x000 => "jmpso",
        0x100 | 0x101 => "jmp",
        0x140 | 0x141 => "call",
        0x080..=0x0AF if brch & 1 == 0 => {
            let flag = FLAGS.get(((brch >> 3) & 7) as usize)?;
            let not = if brch.get_bit(1) { "" } else { "n" };
            let acc = if brch.get_bit(2) { "b" } else { "a" };
            // The overflow and sign flags put the accumulator before the digit.
            let name = match flag.split_at(flag.len() - 1) {
                (stem, digit) if digit == "0" || digit == "1" => {
                    format!("j{not}{stem}{acc}{digit}")
                }
                _ => format!("j{not}{flag}{acc}"),
            };
            return Some(name);
        }
        0x0B0 => "jdpl0",
        0x0B1 => "jdpln0",
        0x0B2 => "jdplf",
        0x0B3 => "jdplnf",
        0x0B4 => "jnsiak",
        0x0B6 => "jsiak",
        0x0B8 => "jnsoak",
        0x0BA => "jsoak",
        0x0BC => "jnrqm",
        0x0BE => "jrqm",
        _ => return None,
    };
    Some(name.to_string())
}

fn format_op(op: u32) -> String {
    let alu = op.get_bits(16..=19);
    let acc = if op.get_bit(15) { "b" } else { "a" };
    let p = P_SELECT[op.get_bits(20..=21) as usize];
    let src = SOURCES[op.get_bits(4..=7) as usize];
    let dst = op.get_bits(0..=3);

    let mut parts = Vec::new();
    match alu {
        0 => {}
        8..=14 => parts.push(format!("{} {acc}", ALU[alu as usize])),
        _ => parts.push(format!("{} {acc},{p}", ALU[alu as usize])),
    }
    if dst != 0 {
        parts.push(format!("mov {src},{}", DESTINATIONS[dst as usize]));
    }
    match op.get_bits(13..=14) {
        1 => parts.push("dpinc".to_string()),
        2 => parts.push("dpdec".to_string()),
        3 => parts.push("dpclr".to_string()),
        _ => {}
    }
    match op.get_bits(9..=12) {
        0 => {}
        dphm => parts.push(format!("m{dphm:X}")),
    }
    if op.get_bit(8) {
        parts.push("rpdec".to_string());
    }

    if parts.is_empty() {
        "nop".to_string()
    } else {
        parts.join(" | ")
    }
}

/// One 24-bit instruction word.
pub fn disassemble(op: u32) -> String {
    match op.get_bits(22..=23) {
        0 => format!("{:<8}{}", "op", format_op(op)),
        1 => format!("{:<8}{}", "rt", format_op(op)),
        2 => {
            let brch = op.get_bits(13..=21);
            let target = (op.get_bits(0..=1) << 11) | op.get_bits(2..=12);
            let target = target | ((brch & 1) << 13);
            match branch_name(brch) {
                Some(name) if brch == 0 => name,
                Some(name) => format!("{name:<8}${target:04X}"),
                None => format!("{:<8}${op:06X}", "dc"),
            }
        }
        _ => format!(
            "{:<8}${:04X},{}",
            "ld",
            op.get_bits(6..=21),
            DESTINATIONS[op.get_bits(0..=3) as usize]
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_disassemble() {
        assert_eq!(disassemble((3 << 22) | (0xBEEF << 6) | 15), "ld      $BEEF,mem");
        assert_eq!(
            disassemble((1 << 20) | (5 << 16) | (3 << 4) | 1 | (1 << 13) | (1 << 8)),
            "op      add a,idb | mov tr,a | dpinc | rpdec"
        );
        assert_eq!(
            disassemble((1 << 22) | (9 << 16) | (1 << 15) | (3 << 9)),
            "rt      inc b | m3"
        );
        assert_eq!(disassemble(0), "op      nop");
    }

    #[test]
    fn test_branches() {
        let jp = |brch: u32, na: u32| (2 << 22) | (brch << 13) | (na << 2);
        assert_eq!(disassemble(jp(0x080, 0x10)), "jnca    $0010");
        assert_eq!(disassemble(jp(0x08E, 0x10)), "jzb     $0010");
        assert_eq!(disassemble(jp(0x092, 0x10)), "jova0   $0010");
        assert_eq!(disassemble(jp(0x0AC, 0x10)), "jnsb1   $0010");
        assert_eq!(disassemble(jp(0x0BE, 0x7FF)), "jrqm    $07FF");
        assert_eq!(disassemble(jp(0x141, 1)), "call    $2001");
        assert_eq!(disassemble(jp(0, 0)), "jmpso");
        assert_eq!(disassemble(jp(0x1FF, 0)), "dc      $BFE000");
    }
}
