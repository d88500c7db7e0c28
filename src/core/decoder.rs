//! Minimal x86 length/class decoder.
//!
//! Unlike the original tool (which wraps `libopcodes` and only classifies
//! control flow by matching on its rendered mnemonic text), this decoder owns
//! the full opcode-to-length table itself: there is no equivalent disassembler
//! crate in this workspace's dependency stack, so the driver needs a
//! self-contained decoder that can size an arbitrary 32-bit instruction and
//! recognize the handful of opcode families that matter for tracing.
//!
//! `text` is a best-effort rendering used only by the listing printer; the
//! driver consumes only `size`, `class` and `target`.
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionClass {
    Misc,
    CondJump,
    Jump,
    Call,
    Ret,
}

#[derive(Debug, Clone)]
pub struct Decoded {
    pub size: usize,
    pub class: InstructionClass,
    pub target: u32,
    pub text: String,
}

impl Decoded {
    fn misc(size: usize, text: &str) -> Self {
        Self {
            size,
            class: InstructionClass::Misc,
            target: 0,
            text: text.to_string(),
        }
    }

    fn truncated() -> Self {
        Self {
            size: 0,
            class: InstructionClass::Misc,
            target: 0,
            text: String::new(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty instruction buffer")]
    EmptyBuffer,
    #[error("unrecognized opcode 0x{opcode:02x}")]
    UnknownOpcode { opcode: u8 },
}

fn modrm_len(bytes: &[u8]) -> Option<usize> {
    let modrm = *bytes.first()?;
    let md = modrm >> 6;
    let rm = modrm & 0x07;
    let mut len = 1usize;

    let mut base_is_5 = false;
    if md != 3 && rm == 4 {
        let sib = *bytes.get(len)?;
        base_is_5 = sib & 0x07 == 5;
        len += 1;
    }

    len += match md {
        0 => {
            if rm == 5 || (rm == 4 && base_is_5) {
                4
            } else {
                0
            }
        }
        1 => 1,
        2 => 4,
        3 => 0,
        _ => unreachable!(),
    };

    Some(len)
}

fn modrm_reg(byte: u8) -> u8 {
    (byte >> 3) & 0x07
}

/// `addr` is the virtual address of the first prefix/opcode byte; `bytes`
/// must contain at least the instruction's first byte but may be shorter
/// than the full instruction (truncation yields `size == 0`, not an error).
pub fn decode(addr: u32, bytes: &[u8]) -> Result<Decoded, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyBuffer);
    }

    let mut pos = 0usize;
    let mut opsize16 = false;

    loop {
        match bytes.get(pos) {
            Some(0x66) => {
                opsize16 = true;
                pos += 1;
            }
            Some(0x67) | Some(0xf0) | Some(0xf2) | Some(0xf3) | Some(0x2e) | Some(0x36)
            | Some(0x3e) | Some(0x26) | Some(0x64) | Some(0x65) => {
                pos += 1;
            }
            _ => break,
        }
    }

    let opcode = match bytes.get(pos) {
        Some(&b) => b,
        None => return Ok(Decoded::truncated()),
    };
    pos += 1;

    if opcode == 0x0f {
        return decode_two_byte(addr, bytes, pos);
    }

    decode_one_byte(addr, bytes, opcode, pos, opsize16)
}

fn rel_target(addr: u32, bytes: &[u8], size: usize) -> Option<u32> {
    if size < 5 {
        let disp = *bytes.get(size - 1)? as i8 as i64;
        Some((addr as i64 + size as i64 + disp) as u32)
    } else {
        let disp = i32::from_le_bytes(bytes.get(size - 4..size)?.try_into().ok()?) as i64;
        Some((addr as i64 + size as i64 + disp) as u32)
    }
}

fn decode_one_byte(
    addr: u32,
    bytes: &[u8],
    opcode: u8,
    pos: usize,
    opsize16: bool,
) -> Result<Decoded, DecodeError> {
    let imm_width = if opsize16 { 2 } else { 4 };

    macro_rules! avail {
        ($end:expr) => {{
            let end = $end;
            if bytes.len() < end {
                return Ok(Decoded::truncated());
            }
            end
        }};
    }

    macro_rules! modrm {
        () => {
            match modrm_len(&bytes[pos..]) {
                Some(n) => n,
                None => return Ok(Decoded::truncated()),
            }
        };
    }

    match opcode {
        // arithmetic group: add/or/adc/sbb/and/sub/xor/cmp, all encoding forms
        0x00..=0x3f => {
            let sub = opcode & 0x07;
            match sub {
                0 | 1 | 2 | 3 => {
                    let m = modrm!();
                    Ok(Decoded::misc(pos + m, "arith"))
                }
                4 => {
                    let end = avail!(pos + 1);
                    Ok(Decoded::misc(end, "arith al,imm8"))
                }
                5 => {
                    let end = avail!(pos + imm_width);
                    Ok(Decoded::misc(end, "arith eax,imm"))
                }
                _ => Ok(Decoded::misc(pos, "pushpop-seg-or-ascii-adjust")),
            }
        }
        0x40..=0x4f => Ok(Decoded::misc(pos, "inc/dec reg")),
        0x50..=0x5f => Ok(Decoded::misc(pos, "push/pop reg")),
        0x60 => Ok(Decoded::misc(pos, "pusha")),
        0x61 => Ok(Decoded::misc(pos, "popa")),
        0x62 => {
            let m = modrm!();
            Ok(Decoded::misc(pos + m, "bound"))
        }
        0x63 => {
            let m = modrm!();
            Ok(Decoded::misc(pos + m, "arpl"))
        }
        0x68 => {
            let end = avail!(pos + imm_width);
            Ok(Decoded::misc(end, "push imm"))
        }
        0x69 => {
            let m = modrm!();
            let end = avail!(pos + m + imm_width);
            Ok(Decoded::misc(end, "imul r,r/m,imm"))
        }
        0x6a => {
            let end = avail!(pos + 1);
            Ok(Decoded::misc(end, "push imm8"))
        }
        0x6b => {
            let m = modrm!();
            let end = avail!(pos + m + 1);
            Ok(Decoded::misc(end, "imul r,r/m,imm8"))
        }
        0x6c..=0x6f => Ok(Decoded::misc(pos, "ins/outs")),
        0x70..=0x7f => {
            let end = avail!(pos + 1);
            let target = rel_target(addr, bytes, end).unwrap_or(0);
            Ok(Decoded {
                size: end,
                class: InstructionClass::CondJump,
                target,
                text: format!("jcc short 0x{:x}", target),
            })
        }
        0x80 | 0x82 => {
            let m = modrm!();
            let end = avail!(pos + m + 1);
            Ok(Decoded::misc(end, "group1 r/m8,imm8"))
        }
        0x81 => {
            let m = modrm!();
            let end = avail!(pos + m + imm_width);
            Ok(Decoded::misc(end, "group1 r/m,imm"))
        }
        0x83 => {
            let m = modrm!();
            let end = avail!(pos + m + 1);
            Ok(Decoded::misc(end, "group1 r/m,imm8"))
        }
        0x84 | 0x85 | 0x86 | 0x87 | 0x88 | 0x89 | 0x8a | 0x8b | 0x8c | 0x8e => {
            let m = modrm!();
            Ok(Decoded::misc(pos + m, "test/xchg/mov"))
        }
        0x8d => {
            let m = modrm!();
            Ok(Decoded::misc(pos + m, "lea"))
        }
        0x8f => {
            let m = modrm!();
            Ok(Decoded::misc(pos + m, "pop r/m"))
        }
        0x90 => Ok(Decoded::misc(pos, "nop")),
        0x91..=0x97 => Ok(Decoded::misc(pos, "xchg eax,reg")),
        0x98 => Ok(Decoded::misc(pos, "cwde")),
        0x99 => Ok(Decoded::misc(pos, "cdq")),
        0x9a => {
            let end = avail!(pos + 6);
            Ok(Decoded::misc(end, "call far ptr"))
        }
        0x9b..=0x9f => Ok(Decoded::misc(pos, "fwait/pushf/popf/sahf/lahf")),
        0xa0..=0xa3 => {
            let end = avail!(pos + 4);
            Ok(Decoded::misc(end, "mov al/eax,moffs"))
        }
        0xa4..=0xa7 => Ok(Decoded::misc(pos, "movs/cmps")),
        0xa8 => {
            let end = avail!(pos + 1);
            Ok(Decoded::misc(end, "test al,imm8"))
        }
        0xa9 => {
            let end = avail!(pos + imm_width);
            Ok(Decoded::misc(end, "test eax,imm"))
        }
        0xaa..=0xaf => Ok(Decoded::misc(pos, "stos/lods/scas")),
        0xb0..=0xb7 => {
            let end = avail!(pos + 1);
            Ok(Decoded::misc(end, "mov r8,imm8"))
        }
        0xb8..=0xbf => {
            let end = avail!(pos + imm_width);
            Ok(Decoded::misc(end, "mov r32,imm"))
        }
        0xc0 | 0xc1 => {
            let m = modrm!();
            let end = avail!(pos + m + 1);
            Ok(Decoded::misc(end, "shift r/m,imm8"))
        }
        0xc2 => {
            let end = avail!(pos + 2);
            Ok(Decoded {
                size: end,
                class: InstructionClass::Ret,
                target: 0,
                text: "ret".to_string(),
            })
        }
        0xc3 => Ok(Decoded {
            size: pos,
            class: InstructionClass::Ret,
            target: 0,
            text: "ret".to_string(),
        }),
        0xc4 | 0xc5 => {
            let m = modrm!();
            Ok(Decoded::misc(pos + m, "les/lds"))
        }
        0xc6 => {
            let m = modrm!();
            let end = avail!(pos + m + 1);
            Ok(Decoded::misc(end, "mov r/m8,imm8"))
        }
        0xc7 => {
            let m = modrm!();
            let end = avail!(pos + m + imm_width);
            Ok(Decoded::misc(end, "mov r/m,imm"))
        }
        0xc8 => {
            let end = avail!(pos + 3);
            Ok(Decoded::misc(end, "enter"))
        }
        0xc9 => Ok(Decoded::misc(pos, "leave")),
        0xca => {
            let end = avail!(pos + 2);
            Ok(Decoded {
                size: end,
                class: InstructionClass::Ret,
                target: 0,
                text: "lret".to_string(),
            })
        }
        0xcb => Ok(Decoded {
            size: pos,
            class: InstructionClass::Ret,
            target: 0,
            text: "lret".to_string(),
        }),
        0xcc => Ok(Decoded::misc(pos, "int3")),
        0xcd => {
            let end = avail!(pos + 1);
            Ok(Decoded::misc(end, "int imm8"))
        }
        0xce => Ok(Decoded::misc(pos, "into")),
        0xcf => Ok(Decoded {
            size: pos,
            class: InstructionClass::Ret,
            target: 0,
            text: "iret".to_string(),
        }),
        0xd0..=0xd3 => {
            let m = modrm!();
            Ok(Decoded::misc(pos + m, "shift r/m,1/cl"))
        }
        0xd4 | 0xd5 => {
            let end = avail!(pos + 1);
            Ok(Decoded::misc(end, "aam/aad"))
        }
        0xd6 => Ok(Decoded::misc(pos, "salc")),
        0xd7 => Ok(Decoded::misc(pos, "xlat")),
        0xd8..=0xdf => {
            let m = modrm!();
            Ok(Decoded::misc(pos + m, "fpu escape"))
        }
        0xe0..=0xe3 => {
            let end = avail!(pos + 1);
            let target = rel_target(addr, bytes, end).unwrap_or(0);
            Ok(Decoded {
                size: end,
                class: InstructionClass::CondJump,
                target,
                text: format!("loop 0x{:x}", target),
            })
        }
        0xe4..=0xe7 => {
            let end = avail!(pos + 1);
            Ok(Decoded::misc(end, "in/out imm8"))
        }
        0xe8 => {
            let end = avail!(pos + 4);
            let target = rel_target(addr, bytes, end).unwrap_or(0);
            Ok(Decoded {
                size: end,
                class: InstructionClass::Call,
                target,
                text: format!("call 0x{:x}", target),
            })
        }
        0xe9 => {
            let end = avail!(pos + 4);
            let target = rel_target(addr, bytes, end).unwrap_or(0);
            Ok(Decoded {
                size: end,
                class: InstructionClass::Jump,
                target,
                text: format!("jmp 0x{:x}", target),
            })
        }
        0xea => {
            let end = avail!(pos + 6);
            Ok(Decoded::misc(end, "jmp far ptr"))
        }
        0xeb => {
            let end = avail!(pos + 1);
            let target = rel_target(addr, bytes, end).unwrap_or(0);
            Ok(Decoded {
                size: end,
                class: InstructionClass::Jump,
                target,
                text: format!("jmp short 0x{:x}", target),
            })
        }
        0xec..=0xef => Ok(Decoded::misc(pos, "in/out dx")),
        0xf1 => Ok(Decoded::misc(pos, "icebp")),
        0xf4 => Ok(Decoded::misc(pos, "hlt")),
        0xf5 => Ok(Decoded::misc(pos, "cmc")),
        0xf6 => {
            let m = modrm!();
            let reg = modrm_reg(bytes[pos]);
            let extra = if reg == 0 || reg == 1 { 1 } else { 0 };
            let end = avail!(pos + m + extra);
            Ok(Decoded::misc(end, "group3 r/m8"))
        }
        0xf7 => {
            let m = modrm!();
            let reg = modrm_reg(bytes[pos]);
            let extra = if reg == 0 || reg == 1 { imm_width } else { 0 };
            let end = avail!(pos + m + extra);
            Ok(Decoded::misc(end, "group3 r/m32"))
        }
        0xf8..=0xfd => Ok(Decoded::misc(pos, "clc/stc/cli/sti/cld/std")),
        0xfe => {
            let m = modrm!();
            Ok(Decoded::misc(pos + m, "inc/dec r/m8"))
        }
        0xff => {
            let m = modrm!();
            let reg = modrm_reg(bytes[pos]);
            let end = pos + m;
            if bytes.len() < end {
                return Ok(Decoded::truncated());
            }
            let class = match reg {
                2 | 3 => InstructionClass::Call,
                4 | 5 => InstructionClass::Jump,
                _ => InstructionClass::Misc,
            };
            Ok(Decoded {
                size: end,
                class,
                target: 0,
                text: "indirect jmp/call".to_string(),
            })
        }
        other => Err(DecodeError::UnknownOpcode { opcode: other }),
    }
}

fn decode_two_byte(addr: u32, bytes: &[u8], pos: usize) -> Result<Decoded, DecodeError> {
    let op2 = match bytes.get(pos) {
        Some(&b) => b,
        None => return Ok(Decoded::truncated()),
    };
    let next = pos + 1;

    if (0x80..=0x8f).contains(&op2) {
        let end = if bytes.len() < next + 4 {
            return Ok(Decoded {
                size: 0,
                class: InstructionClass::CondJump,
                target: 0,
                text: String::new(),
            });
        } else {
            next + 4
        };
        let target = rel_target(addr, bytes, end).unwrap_or(0);
        return Ok(Decoded {
            size: end,
            class: InstructionClass::CondJump,
            target,
            text: format!("jcc near 0x{:x}", target),
        });
    }

    if (0x90..=0x9f).contains(&op2) {
        return match modrm_len(&bytes[next..]) {
            Some(m) => Ok(Decoded::misc(next + m, "setcc")),
            None => Ok(Decoded::truncated()),
        };
    }

    if (0xc8..=0xcf).contains(&op2) {
        return Ok(Decoded::misc(next, "bswap"));
    }

    match op2 {
        0x00..=0x05 => Ok(Decoded::misc(next, "sldt/syscall/clts")),
        0x1f => match modrm_len(&bytes[next..]) {
            Some(m) => Ok(Decoded::misc(next + m, "multi-byte nop")),
            None => Ok(Decoded::truncated()),
        },
        0x31 => Ok(Decoded::misc(next, "rdtsc")),
        0xa0 | 0xa1 | 0xa8 | 0xa9 => Ok(Decoded::misc(next, "push/pop fs/gs")),
        0xa2 => Ok(Decoded::misc(next, "cpuid")),
        0xaf | 0xb6 | 0xb7 | 0xbe | 0xbf => match modrm_len(&bytes[next..]) {
            Some(m) => Ok(Decoded::misc(next + m, "imul/movzx/movsx")),
            None => Ok(Decoded::truncated()),
        },
        0xa3 | 0xab | 0xb3 | 0xbb => match modrm_len(&bytes[next..]) {
            Some(m) => Ok(Decoded::misc(next + m, "bt/bts/btr/btc")),
            None => Ok(Decoded::truncated()),
        },
        other => Err(DecodeError::UnknownOpcode { opcode: other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mov_eax_0_then_ret() {
        let bytes = [0xb8, 0x00, 0x00, 0x00, 0x00, 0xc3];
        let d = decode(0x10000, &bytes).unwrap();
        assert_eq!(d.size, 5);
        assert_eq!(d.class, InstructionClass::Misc);

        let d2 = decode(0x10005, &bytes[5..]).unwrap();
        assert_eq!(d2.size, 1);
        assert_eq!(d2.class, InstructionClass::Ret);
    }

    #[test]
    fn decodes_call_rel32() {
        let bytes = [0xe8, 0x05, 0x00, 0x00, 0x00, 0xc3];
        let d = decode(0x10000, &bytes).unwrap();
        assert_eq!(d.size, 5);
        assert_eq!(d.class, InstructionClass::Call);
        assert_eq!(d.target, 0x1000a);
    }

    #[test]
    fn decodes_short_jump() {
        let bytes = [0xeb, 0xfe];
        let d = decode(0x20000, &bytes).unwrap();
        assert_eq!(d.size, 2);
        assert_eq!(d.class, InstructionClass::Jump);
        assert_eq!(d.target, 0x20000);
    }

    #[test]
    fn indirect_ff_call_has_no_target() {
        // ff 10 = call near [eax]
        let bytes = [0xff, 0x10];
        let d = decode(0x30000, &bytes).unwrap();
        assert_eq!(d.size, 2);
        assert_eq!(d.class, InstructionClass::Call);
        assert_eq!(d.target, 0);
    }

    #[test]
    fn truncated_operand_yields_size_zero() {
        let bytes = [0xe8, 0x05, 0x00];
        let d = decode(0x10000, &bytes).unwrap();
        assert_eq!(d.size, 0);
    }

    #[test]
    fn unknown_opcode_is_fatal() {
        let really_unknown = [0x0f, 0x0au8];
        let err = decode(0x10000, &really_unknown).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownOpcode { opcode: 0x0a }));
    }
}
