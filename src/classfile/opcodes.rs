//! Bytecode opcode table.
//!
//! Method bodies are sequences of instructions whose first byte packs an operation and a 3-bit
//! type selector:
//!
//! ```text
//!  7   5 4       0
//! +-----+---------+
//! | sel |   op    |
//! +-----+---------+
//! ```
//!
//! The meaning of the selector depends on the operation: conversions select the conversion
//! direction, calls select the dispatch kind, branches select the width of the jump offset,
//! object and array operations select the access, and everything else selects the operand type.
//! The loader does not interpret method bodies; this table exists for tooling that inspects them.
//!
//! # Examples
//!
//! ```rust
//! use glr::classfile::opcodes::{Instruction, Op, Operand, OperandType};
//!
//! let byte = Instruction::encode(Op::Add, 5);
//! let decoded = Instruction::decode(byte).unwrap();
//!
//! assert_eq!(decoded.op, Op::Add);
//! assert_eq!(decoded.operand, Some(Operand::Type(OperandType::I64)));
//! ```

use strum::{Display, EnumCount, EnumIter, FromRepr};

/// Mask of the operation bits in an opcode byte.
pub const OP_MASK: u8 = 0x1F;

/// Position of the selector bits in an opcode byte.
pub const SELECTOR_SHIFT: u8 = 5;

/// Bytecode operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, EnumCount, Display)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum Op {
    /// Return a register
    Ret = 0,
    /// Load a constant pool entry into a register
    Ldc = 1,
    /// Add two registers
    Add = 2,
    /// Subtract two registers
    Sub = 3,
    /// Multiply two registers
    Mul = 4,
    /// Divide two registers
    Div = 5,
    /// Copy one register into another
    Mov = 6,
    /// Negate a register
    Neg = 7,
    /// Convert a register to another type
    Cvt = 8,
    /// Remainder of two registers
    Mod = 9,
    /// Bitwise exclusive or
    Xor = 10,
    /// Shift right
    Shr = 11,
    /// Shift left
    Shl = 12,
    /// Bitwise and
    And = 13,
    /// Bitwise or
    Or = 14,
    /// Unconditional jump
    Jmp = 15,
    /// Jump if equal
    Je = 16,
    /// Jump if not equal
    Jne = 17,
    /// Jump if less
    Jl = 18,
    /// Jump if less or equal
    Jle = 19,
    /// Jump if greater
    Jg = 20,
    /// Jump if greater or equal
    Jge = 21,
    /// Jump if a register holds an instance of a class
    Jinst = 22,
    /// Call with the arguments pushed on the stack
    Call = 23,
    /// Create an object or access its fields
    Obj = 24,
    /// Create an array or access its items
    Arr = 25,
    /// Throw the exception object held in a register
    Throw = 26,
}

impl Op {
    /// Returns `true` for the conditional and unconditional jumps.
    #[must_use]
    pub fn is_branch(self) -> bool {
        (Op::Jmp as u8..=Op::Jinst as u8).contains(&(self as u8))
    }
}

/// Operand type of arithmetic, move and load operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, EnumCount, Display)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum OperandType {
    /// Unsigned 8-bit
    U8 = 0,
    /// Unsigned 16-bit
    U16 = 1,
    /// Unsigned 32-bit
    U32 = 2,
    /// Unsigned 64-bit
    U64 = 3,
    /// Signed 32-bit
    I32 = 4,
    /// Signed 64-bit
    I64 = 5,
    /// Floating point 32-bit
    F32 = 6,
    /// Floating point 64-bit
    F64 = 7,
}

impl OperandType {
    /// Width of the type in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            OperandType::U8 => 1,
            OperandType::U16 => 2,
            OperandType::U32 | OperandType::I32 | OperandType::F32 => 4,
            OperandType::U64 | OperandType::I64 | OperandType::F64 => 8,
        }
    }
}

/// Direction of a [`Op::Cvt`] conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, EnumCount, Display)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum Conversion {
    /// Float to signed
    FtoI = 0,
    /// Float to unsigned
    FtoU = 1,
    /// Signed to unsigned
    ItoU = 2,
    /// Signed to float
    ItoF = 3,
    /// Unsigned to signed
    UtoI = 4,
    /// Unsigned to float
    UtoF = 5,
}

/// Width and signedness of a branch offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, EnumCount, Display)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum BranchOffset {
    /// Unsigned 8-bit
    U8 = 0,
    /// Unsigned 16-bit
    U16 = 1,
    /// Unsigned 32-bit
    U32 = 2,
    /// Signed 8-bit
    I8 = 3,
    /// Signed 16-bit
    I16 = 4,
    /// Signed 32-bit
    I32 = 5,
}

/// Dispatch of a [`Op::Call`] instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, EnumCount, Display)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum CallDispatch {
    /// Regular call
    Normal = 0,
    /// Tail call
    Tail = 1,
    /// Virtual call
    Virtual = 2,
}

/// Access performed by [`Op::Obj`] and [`Op::Arr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, EnumCount, Display)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum ObjectAccess {
    /// Allocate
    New = 0,
    /// Read a field or item
    Get = 1,
    /// Write a field or item
    Set = 2,
    /// Field count or array length
    Size = 3,
}

/// The selector of an instruction, interpreted for its operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Operand type of arithmetic and data movement
    Type(OperandType),
    /// Conversion direction
    Conversion(Conversion),
    /// Branch offset encoding
    Branch(BranchOffset),
    /// Call dispatch
    Call(CallDispatch),
    /// Object or array access
    Object(ObjectAccess),
}

/// A decoded opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// The operation
    pub op: Op,
    /// Raw selector bits
    pub selector: u8,
    /// Selector interpreted for `op`, `None` if the selector is undefined for it
    pub operand: Option<Operand>,
}

impl Instruction {
    /// Decode an opcode byte. Returns `None` for unknown operations.
    #[must_use]
    pub fn decode(byte: u8) -> Option<Instruction> {
        let op = Op::from_repr(byte & OP_MASK)?;
        let selector = byte >> SELECTOR_SHIFT;

        let operand = match op {
            Op::Cvt => Conversion::from_repr(selector).map(Operand::Conversion),
            Op::Call => CallDispatch::from_repr(selector).map(Operand::Call),
            Op::Obj | Op::Arr => ObjectAccess::from_repr(selector).map(Operand::Object),
            op if op.is_branch() => BranchOffset::from_repr(selector).map(Operand::Branch),
            _ => OperandType::from_repr(selector).map(Operand::Type),
        };

        Some(Instruction {
            op,
            selector,
            operand,
        })
    }

    /// Encode `op` with the selector `selector`; selector bits above the third are dropped.
    #[must_use]
    pub fn encode(op: Op, selector: u8) -> u8 {
        ((selector & 0x07) << SELECTOR_SHIFT) | (op as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::{EnumCount, IntoEnumIterator};

    #[test]
    fn every_op_roundtrips() {
        assert_eq!(Op::COUNT, 27);
        for op in Op::iter() {
            for selector in 0..8 {
                let decoded = Instruction::decode(Instruction::encode(op, selector)).unwrap();
                assert_eq!(decoded.op, op);
                assert_eq!(decoded.selector, selector);
            }
        }
    }

    #[test]
    fn unknown_ops() {
        for op in 27..32u8 {
            assert!(Instruction::decode(op).is_none());
            assert!(Instruction::decode(op | 0xE0).is_none());
        }
    }

    #[test]
    fn selector_interpretation() {
        let cvt = Instruction::decode(Instruction::encode(Op::Cvt, 3)).unwrap();
        assert_eq!(cvt.operand, Some(Operand::Conversion(Conversion::ItoF)));

        let cvt = Instruction::decode(Instruction::encode(Op::Cvt, 7)).unwrap();
        assert_eq!(cvt.operand, None);

        let call = Instruction::decode(Instruction::encode(Op::Call, 1)).unwrap();
        assert_eq!(call.operand, Some(Operand::Call(CallDispatch::Tail)));

        let jump = Instruction::decode(Instruction::encode(Op::Jle, 4)).unwrap();
        assert_eq!(jump.operand, Some(Operand::Branch(BranchOffset::I16)));

        let arr = Instruction::decode(Instruction::encode(Op::Arr, 3)).unwrap();
        assert_eq!(arr.operand, Some(Operand::Object(ObjectAccess::Size)));

        let ldc = Instruction::decode(Instruction::encode(Op::Ldc, 7)).unwrap();
        assert_eq!(ldc.operand, Some(Operand::Type(OperandType::F64)));
        assert_eq!(OperandType::F64.size(), 8);
    }

    #[test]
    fn names() {
        assert_eq!(Op::Jinst.to_string(), "jinst");
        assert_eq!(OperandType::I32.to_string(), "i32");
        assert!(Op::Jmp.is_branch());
        assert!(!Op::Call.is_branch());
    }
}
