//! Property tests: folded literals match native Rust integer arithmetic.

use proptest::prelude::*;
use wcetopt::core::{BinOp, Const, Overflow, Type, Width};
use wcetopt::passes::ConstantFolding;

const OPS: [BinOp; 16] = [
    BinOp::Add,
    BinOp::Sub,
    BinOp::Mul,
    BinOp::Div,
    BinOp::Rem,
    BinOp::And,
    BinOp::Or,
    BinOp::Xor,
    BinOp::Shl,
    BinOp::Shr,
    BinOp::Eq,
    BinOp::Ne,
    BinOp::Lt,
    BinOp::Le,
    BinOp::Gt,
    BinOp::Ge,
];

const TYPES: [Type; 8] =
    [Type::I8, Type::I16, Type::I32, Type::I64, Type::U8, Type::U16, Type::U32, Type::U64];

macro_rules! native {
    ($t:ty, $op:expr, $sat:expr, $a:expr, $b:expr) => {{
        let (a, b) = ($a as $t, $b as $t);
        let result: Option<i128> = match $op {
            BinOp::Add if $sat => Some(a.saturating_add(b) as i128),
            BinOp::Add => Some(a.wrapping_add(b) as i128),
            BinOp::Sub if $sat => Some(a.saturating_sub(b) as i128),
            BinOp::Sub => Some(a.wrapping_sub(b) as i128),
            BinOp::Mul if $sat => Some(a.saturating_mul(b) as i128),
            BinOp::Mul => Some(a.wrapping_mul(b) as i128),
            BinOp::Div | BinOp::Rem if b == 0 => None,
            BinOp::Div if $sat => Some(a.saturating_div(b) as i128),
            BinOp::Div => Some(a.wrapping_div(b) as i128),
            BinOp::Rem => Some(a.wrapping_rem(b) as i128),
            BinOp::And => Some((a & b) as i128),
            BinOp::Or => Some((a | b) as i128),
            BinOp::Xor => Some((a ^ b) as i128),
            BinOp::Shl => Some(a.wrapping_shl(b as u32) as i128),
            BinOp::Shr => Some(a.wrapping_shr(b as u32) as i128),
            BinOp::Eq => Some((a == b) as i128),
            BinOp::Ne => Some((a != b) as i128),
            BinOp::Lt => Some((a < b) as i128),
            BinOp::Le => Some((a <= b) as i128),
            BinOp::Gt => Some((a > b) as i128),
            BinOp::Ge => Some((a >= b) as i128),
        };
        result
    }};
}

fn native(op: BinOp, ty: Type, a: u64, b: u64) -> Option<i128> {
    let sat = ty.overflow == Overflow::Saturating;
    match (ty.width, ty.signed) {
        (Width::W8, true) => native!(i8, op, sat, a, b),
        (Width::W16, true) => native!(i16, op, sat, a, b),
        (Width::W32, true) => native!(i32, op, sat, a, b),
        (Width::W64, true) => native!(i64, op, sat, a, b),
        (Width::W8, false) => native!(u8, op, sat, a, b),
        (Width::W16, false) => native!(u16, op, sat, a, b),
        (Width::W32, false) => native!(u32, op, sat, a, b),
        (Width::W64, false) => native!(u64, op, sat, a, b),
        (Width::W1, _) => unreachable!("bool is not an arithmetic type"),
    }
}

/// Raw operand bits, biased towards zero, small values and the edges of every width.
fn operand() -> impl Strategy<Value = u64> {
    prop_oneof![
        any::<u64>(),
        0u64..8,
        (0u64..8).prop_map(|k| u64::MAX - k),
        prop::sample::select(vec![0x7f, 0x80, 0x7fff, 0x8000, 0x7fff_ffff, 0x8000_0000, 1 << 63]),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 2048,
        .. ProptestConfig::default()
    })]
    #[test]
    fn fold_matches_native_arithmetic(
        op in prop::sample::select(OPS.to_vec()),
        ty in prop::sample::select(TYPES.to_vec()),
        saturating in any::<bool>(),
        a in operand(),
        b in operand(),
    ) {
        let ty = if saturating { ty.saturating() } else { ty };
        let folded = ConstantFolding::new()
            .fold_binary(op, ty, Const::new(ty, a as i128), Const::new(ty, b as i128))
            .map(Const::value);
        prop_assert_eq!(folded, native(op, ty, a, b), "{:?} on {} with {:#x}, {:#x}", op, ty, a, b);
    }
}
