use crate::op::{Op, ValueKind};

/// A forward branch whose offset has not yet been resolved.
///
/// Created by [`BytecodeBuilder::if_ne`], [`BytecodeBuilder::if_icmp_ne`]
/// and [`BytecodeBuilder::goto`]. Resolve it with [`BytecodeBuilder::bind`].
#[derive(Debug)]
#[must_use = "an unbound label leaves a zero branch offset behind"]
pub struct Label {
    /// Position of the i16 offset bytes in the buffer.
    offset_pos: usize,
    /// Position of the branch opcode (base for the relative offset).
    base: usize,
}

/// Builds a JVM `Code` attribute byte sequence.
///
/// The builder automatically emits the [`Op::Wide`] prefix when a local
/// index exceeds `u8::MAX`, and picks `ldc_w` over `ldc` when a constant
/// index does not fit in a byte.
pub struct BytecodeBuilder {
    buf: Vec<u8>,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Current byte offset in the bytecode stream.
    pub fn current_offset(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    // ── emit helpers ───────────────────────────────────────────────

    fn emit_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    // Class files are big-endian.
    fn emit_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn emit_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn emit_op(&mut self, op: Op) {
        self.buf.push(op as u8);
    }

    fn needs_wide(slot: u16) -> bool {
        slot > u8::MAX as u16
    }

    fn emit_local(&mut self, op: Op, slot: u16) {
        let wide = Self::needs_wide(slot);
        if wide {
            self.emit_op(Op::Wide);
        }
        self.emit_op(op);
        if wide {
            self.emit_u16(slot);
        } else {
            self.emit_u8(slot as u8);
        }
    }

    /// `<t>load <slot>` pushes a local onto the operand stack.
    pub fn load(&mut self, op: Op, slot: u16) {
        debug_assert!(op.is_load(), "not a load opcode: {op:?}");
        self.emit_local(op, slot);
    }

    /// `<t>store <slot>` pops the operand stack into a local.
    pub fn store(&mut self, op: Op, slot: u16) {
        debug_assert!(op.is_store(), "not a store opcode: {op:?}");
        self.emit_local(op, slot);
    }

    /// `iconst_0` / `iconst_1`.
    pub fn iconst(&mut self, value: bool) {
        self.emit_op(if value { Op::IConst1 } else { Op::IConst0 });
    }

    /// `ldc <idx>`: selects `ldc_w` when the index exceeds a byte.
    pub fn ldc(&mut self, idx: u16) {
        if let Ok(narrow) = u8::try_from(idx) {
            self.emit_op(Op::Ldc);
            self.emit_u8(narrow);
        } else {
            self.emit_op(Op::LdcW);
            self.emit_u16(idx);
        }
    }

    /// `invokevirtual` / `invokestatic <method_idx:u16>`.
    pub fn invoke(&mut self, op: Op, method_idx: u16) {
        debug_assert!(op.is_invoke(), "not an invoke opcode: {op:?}");
        self.emit_op(op);
        self.emit_u16(method_idx);
    }

    /// `<t>return` or `return`.
    pub fn return_(&mut self, op: Op) {
        debug_assert!(op.is_return(), "not a return opcode: {op:?}");
        self.emit_op(op);
    }

    pub fn lcmp(&mut self) {
        self.emit_op(Op::LCmp);
    }

    pub fn fcmpl(&mut self) {
        self.emit_op(Op::FCmpL);
    }

    pub fn dcmpl(&mut self) {
        self.emit_op(Op::DCmpL);
    }

    /// Emit `ifne` with an unresolved target. Returns a [`Label`].
    pub fn if_ne(&mut self) -> Label {
        self.emit_branch_placeholder(Op::IfNe)
    }

    /// Emit `if_icmpne` with an unresolved target. Returns a [`Label`].
    pub fn if_icmp_ne(&mut self) -> Label {
        self.emit_branch_placeholder(Op::IfICmpNe)
    }

    /// Emit an unconditional forward `goto`. Returns a [`Label`].
    pub fn goto(&mut self) -> Label {
        self.emit_branch_placeholder(Op::Goto)
    }

    /// Bind a forward branch label to the current position.
    pub fn bind(&mut self, label: Label) {
        let target = self.buf.len();
        let offset = (target as isize - label.base as isize) as i16;
        self.buf[label.offset_pos..label.offset_pos + 2]
            .copy_from_slice(&offset.to_be_bytes());
    }

    /// Compare the two values of `kind` on top of the stack and leave an
    /// int boolean: `1` when equal, `0` otherwise.
    ///
    /// Floating point uses the `l` comparison variants, so `NaN` never
    /// compares equal.
    ///
    /// # Panics
    ///
    /// Panics on [`ValueKind::Reference`]. Reference equality is a method
    /// call, not an instruction sequence.
    pub fn equal(&mut self, kind: ValueKind) {
        let not_equal = match kind {
            ValueKind::Int => self.if_icmp_ne(),
            ValueKind::Long => {
                self.lcmp();
                self.if_ne()
            }
            ValueKind::Float => {
                self.fcmpl();
                self.if_ne()
            }
            ValueKind::Double => {
                self.dcmpl();
                self.if_ne()
            }
            ValueKind::Reference => {
                unreachable!("reference equality is a method call")
            }
        };
        self.iconst(true);
        let end = self.goto();
        self.bind(not_equal);
        self.iconst(false);
        self.bind(end);
    }

    fn emit_branch_placeholder(&mut self, op: Op) -> Label {
        let base = self.buf.len();
        self.emit_op(op);
        let offset_pos = self.buf.len();
        self.emit_i16(0); // placeholder
        Label { offset_pos, base }
    }
}

impl Default for BytecodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
