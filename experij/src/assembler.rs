use std::fmt::{self, Write};

use bytecode::{
    AccessFlags, BytecodeBuilder, BytecodeDecoder, ConstantPool, DecodeError, Instruction, Op,
    PoolOverflow, ValueKind,
};
use descriptor::{Descriptor, DescriptorError};

use crate::sink::CodeSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    /// An instruction arrived outside `begin_method`/`end_method`.
    NoOpenMethod,
    /// `begin_method` while another method was still open.
    MethodAlreadyOpen { open: String, requested: String },
    /// An instruction popped more than the operand stack held.
    StackUnderflow { method: String, offset: usize },
    /// `compare` was asked to compare references.
    ReferenceCompare { method: String },
    Descriptor(DescriptorError),
    Pool(PoolOverflow),
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOpenMethod => write!(f, "instruction emitted outside of a method"),
            Self::MethodAlreadyOpen { open, requested } => {
                write!(f, "cannot begin `{requested}` while `{open}` is open")
            }
            Self::StackUnderflow { method, offset } => {
                write!(f, "operand stack underflow in `{method}` at {offset}")
            }
            Self::ReferenceCompare { method } => {
                write!(f, "inline comparison of references in `{method}`")
            }
            Self::Descriptor(err) => write!(f, "{err}"),
            Self::Pool(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AssembleError {}

impl From<DescriptorError> for AssembleError {
    fn from(err: DescriptorError) -> Self {
        Self::Descriptor(err)
    }
}

impl From<PoolOverflow> for AssembleError {
    fn from(err: PoolOverflow) -> Self {
        Self::Pool(err)
    }
}

/// An assembled method: its `Code` attribute bytes and frame limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    pub access: AccessFlags,
    pub name: String,
    pub descriptor: String,
    pub code: Vec<u8>,
    pub max_stack: u16,
    pub max_locals: u16,
}

struct OpenMethod {
    access: AccessFlags,
    name: String,
    descriptor: String,
    builder: BytecodeBuilder,
    depth: u16,
    max_stack: u16,
    max_locals: u16,
}

impl OpenMethod {
    fn push(&mut self, slots: u16) {
        self.depth += slots;
        self.max_stack = self.max_stack.max(self.depth);
    }

    fn pop(&mut self, slots: u16) -> Result<(), AssembleError> {
        self.depth = self.depth.checked_sub(slots).ok_or_else(|| {
            AssembleError::StackUnderflow {
                method: self.name.clone(),
                offset: self.builder.current_offset(),
            }
        })?;
        Ok(())
    }

    fn touch_local(&mut self, op: Op, slot: u16) {
        let width = op.value_kind().map_or(1, ValueKind::width);
        self.max_locals = self.max_locals.max(slot + width);
    }
}

/// A [`CodeSink`] that encodes JVM bytecode.
///
/// Method and string constants are interned in a shared [`ConstantPool`].
/// Operand stack depth is tracked per instruction to derive `max_stack`.
/// The first error is kept and returned by [`finish`](Self::finish); calls
/// after it are ignored.
#[derive(Default)]
pub struct MethodAssembler {
    pool: ConstantPool,
    methods: Vec<MethodBody>,
    open: Option<OpenMethod>,
    error: Option<AssembleError>,
}

impl MethodAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(
        &mut self,
        f: impl FnOnce(&mut OpenMethod, &mut ConstantPool) -> Result<(), AssembleError>,
    ) {
        if self.error.is_some() {
            return;
        }
        let result = match self.open.as_mut() {
            Some(method) => f(method, &mut self.pool),
            None => Err(AssembleError::NoOpenMethod),
        };
        if let Err(err) = result {
            log::debug!("assembler failed: {err}");
            self.error = Some(err);
        }
    }

    pub fn finish(self) -> Result<Assembly, AssembleError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.open.is_some() {
            return Err(AssembleError::NoOpenMethod);
        }
        Ok(Assembly {
            pool: self.pool,
            methods: self.methods,
        })
    }
}

impl CodeSink for MethodAssembler {
    fn begin_method(&mut self, access: AccessFlags, name: &str, descriptor: &Descriptor) {
        if self.error.is_some() {
            return;
        }
        if let Some(open) = &self.open {
            self.error = Some(AssembleError::MethodAlreadyOpen {
                open: open.name.clone(),
                requested: name.to_owned(),
            });
            return;
        }
        let receiver = if access.contains(AccessFlags::STATIC) { 0 } else { 1 };
        self.open = Some(OpenMethod {
            access,
            name: name.to_owned(),
            descriptor: descriptor.to_string(),
            builder: BytecodeBuilder::with_capacity(64),
            depth: 0,
            max_stack: 0,
            max_locals: descriptor.occupied_slots() + receiver,
        });
    }

    fn load(&mut self, op: Op, slot: u16) {
        self.apply(|m, _| {
            m.builder.load(op, slot);
            m.touch_local(op, slot);
            m.push(op.value_kind().map_or(1, ValueKind::width));
            Ok(())
        });
    }

    fn store(&mut self, op: Op, slot: u16) {
        self.apply(|m, _| {
            m.pop(op.value_kind().map_or(1, ValueKind::width))?;
            m.builder.store(op, slot);
            m.touch_local(op, slot);
            Ok(())
        });
    }

    fn invoke(&mut self, op: Op, owner: &str, name: &str, descriptor: &str) {
        self.apply(|m, pool| {
            let callee = Descriptor::parse(descriptor)?;
            let receiver = if op == Op::InvokeStatic { 0 } else { 1 };
            m.pop(callee.occupied_slots() + receiver)?;
            let idx = pool.method_ref(owner, name, descriptor)?;
            m.builder.invoke(op, idx);
            m.push(callee.return_param().width());
            Ok(())
        });
    }

    fn push_string(&mut self, value: &str) {
        self.apply(|m, pool| {
            let idx = pool.string(value)?;
            m.builder.ldc(idx);
            m.push(1);
            Ok(())
        });
    }

    fn compare(&mut self, kind: ValueKind) {
        self.apply(|m, _| {
            if kind == ValueKind::Reference {
                return Err(AssembleError::ReferenceCompare {
                    method: m.name.clone(),
                });
            }
            m.pop(kind.width() * 2)?;
            m.builder.equal(kind);
            m.push(1);
            Ok(())
        });
    }

    fn return_value(&mut self, op: Op) {
        self.apply(|m, _| {
            m.pop(op.value_kind().map_or(0, ValueKind::width))?;
            m.builder.return_(op);
            Ok(())
        });
    }

    fn end_method(&mut self) {
        if self.error.is_some() {
            return;
        }
        let Some(open) = self.open.take() else {
            self.error = Some(AssembleError::NoOpenMethod);
            return;
        };
        log::debug!(
            "assembled {}{}: max_stack={} max_locals={}",
            open.name,
            open.descriptor,
            open.max_stack,
            open.max_locals
        );
        self.methods.push(MethodBody {
            access: open.access,
            name: open.name,
            descriptor: open.descriptor,
            code: open.builder.into_bytes(),
            max_stack: open.max_stack,
            max_locals: open.max_locals,
        });
    }
}

/// The methods produced by a [`MethodAssembler`] and the pool they index.
#[derive(Debug)]
pub struct Assembly {
    pub pool: ConstantPool,
    pub methods: Vec<MethodBody>,
}

impl Assembly {
    pub fn method(&self, name: &str) -> Option<&MethodBody> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn decode(&self, method: &MethodBody) -> Result<Vec<Instruction>, DecodeError> {
        BytecodeDecoder::new(&method.code).collect()
    }

    /// Render a method one instruction per line, resolving constant pool
    /// references.
    pub fn disassemble(&self, method: &MethodBody) -> Result<String, DecodeError> {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} {}{} (stack={}, locals={})",
            method.access, method.name, method.descriptor, method.max_stack, method.max_locals
        );
        let mut decoder = BytecodeDecoder::new(&method.code);
        loop {
            let offset = decoder.offset();
            let Some(instruction) = decoder.next() else {
                break;
            };
            let instruction = instruction?;
            let _ = write!(out, "{offset:>5}: {instruction}");
            match instruction {
                Instruction::Ldc { idx } => {
                    if let Some(value) = self.pool.resolve_string(idx) {
                        let _ = write!(out, " // {value:?}");
                    }
                }
                Instruction::InvokeVirtual { method_idx }
                | Instruction::InvokeStatic { method_idx } => {
                    if let Some(target) = self.pool.resolve_method(method_idx) {
                        let _ = write!(out, " // {target}");
                    }
                }
                _ => {}
            }
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::EntryPointEmitter;
    use crate::experiment::{ExperimentSet, ExperimentSetBuilder};
    use crate::settings::EmitterSettings;

    fn set(descriptor: &str, is_static: bool, experiments: &[&str]) -> ExperimentSet {
        let desc = Descriptor::parse(descriptor).unwrap();
        let mut b = ExperimentSetBuilder::new("demo/Calc", "sum").unwrap();
        b.register("baseline", desc.clone(), true, is_static).unwrap();
        for name in experiments {
            b.register(name, desc.clone(), false, is_static).unwrap();
        }
        b.finish().unwrap()
    }

    fn assemble(set: &ExperimentSet) -> Assembly {
        let settings = EmitterSettings::default();
        let mut asm = MethodAssembler::new();
        EntryPointEmitter::new(set, &settings).emit(&mut asm).unwrap();
        asm.finish().unwrap()
    }

    fn method_name(assembly: &Assembly, instruction: &Instruction) -> Option<String> {
        match *instruction {
            Instruction::InvokeVirtual { method_idx }
            | Instruction::InvokeStatic { method_idx } => assembly
                .pool
                .resolve_method(method_idx)
                .map(|m| m.name.to_owned()),
            _ => None,
        }
    }

    #[test]
    fn instance_int_double_bytecode() {
        let assembly = assemble(&set("(ID)I", false, &["fast", "vectorized"]));
        let body = assembly.method("experij$entry$sum").unwrap();
        let code = assembly.decode(body).unwrap();

        let load = |kind, slot| Instruction::Load { kind, slot };
        let args = [
            load(ValueKind::Reference, 0),
            load(ValueKind::Int, 1),
            load(ValueKind::Double, 2),
        ];
        let compare = [
            Instruction::IfICmpNe { offset: 7 },
            Instruction::IConst { value: 1 },
            Instruction::Goto { offset: 4 },
            Instruction::IConst { value: 0 },
        ];

        assert_eq!(&code[..3], &args);
        assert_eq!(method_name(&assembly, &code[3]).as_deref(), Some("experij$baseline"));
        assert_eq!(code[4], Instruction::Store { kind: ValueKind::Int, slot: 4 });

        let mut at = 5;
        for name in ["experij$fast", "experij$vectorized"] {
            assert_eq!(&code[at..at + 3], &args);
            assert_eq!(method_name(&assembly, &code[at + 3]).as_deref(), Some(name));
            assert_eq!(code[at + 4], load(ValueKind::Int, 4));
            assert_eq!(&code[at + 5..at + 9], &compare);
            assert!(matches!(code[at + 9], Instruction::Ldc { .. }));
            assert!(matches!(code[at + 10], Instruction::Ldc { .. }));
            assert_eq!(method_name(&assembly, &code[at + 11]).as_deref(), Some("report"));
            at += 12;
        }
        assert_eq!(&code[at..], &[
            load(ValueKind::Int, 4),
            Instruction::Return { kind: Some(ValueKind::Int) },
        ]);

        assert_eq!(body.max_stack, 4);
        assert_eq!(body.max_locals, 5);
        assert_eq!(body.access.bits(), 0x1012);
    }

    #[test]
    fn static_long_frame_limits() {
        let assembly = assemble(&set("(JJ)J", true, &["fast"]));
        let body = assembly.method("experij$entry$sum").unwrap();
        // two longs loaded, then two longs compared
        assert_eq!(body.max_stack, 4);
        // params in 0..4, result parked in 4..6
        assert_eq!(body.max_locals, 6);
        let code = assembly.decode(body).unwrap();
        assert!(code.contains(&Instruction::LCmp));
        assert_eq!(code[3], Instruction::Store { kind: ValueKind::Long, slot: 4 });
    }

    #[test]
    fn reference_results_call_equality() {
        let assembly = assemble(&set("(Ljava/lang/String;)[I", true, &["fast"]));
        let body = assembly.method("experij$entry$sum").unwrap();
        let code = assembly.decode(body).unwrap();
        let names: Vec<_> = code
            .iter()
            .filter_map(|i| method_name(&assembly, i))
            .collect();
        assert_eq!(names, vec!["experij$baseline", "experij$fast", "equals", "report"]);
        assert_eq!(code.last(), Some(&Instruction::Return { kind: Some(ValueKind::Reference) }));
    }

    #[test]
    fn disassembly_resolves_constants() {
        let set = set("(I)I", true, &["fast"]);
        let settings = EmitterSettings::default();
        let mut asm = MethodAssembler::new();
        let emitter = EntryPointEmitter::new(&set, &settings);
        emitter.emit(&mut asm).unwrap();
        emitter
            .emit_delegate(&mut asm, AccessFlags::PUBLIC, "baseline")
            .unwrap();
        let assembly = asm.finish().unwrap();
        assert_eq!(assembly.pool.len(), 22);
        assert_eq!(&assembly.pool.encode()[..2], &[0, 23]);

        let entry = assembly.disassemble(&assembly.methods[0]).unwrap();
        assert!(entry.starts_with("private static final synthetic experij$entry$sum(I)I"));
        assert!(entry.contains("invokestatic #6 // demo/Calc.experij$baseline:(I)I"));
        assert!(entry.contains("// \"fast\""));

        let delegate = assembly.disassemble(&assembly.methods[1]).unwrap();
        assert_eq!(
            delegate.lines().collect::<Vec<_>>(),
            vec![
                "public static baseline(I)I (stack=1, locals=1)",
                "    0: iload 0",
                "    2: invokestatic #22 // demo/Calc.experij$entry$sum:(I)I",
                "    5: ireturn",
            ]
        );
    }

    #[test]
    fn instruction_outside_method_is_an_error() {
        let mut asm = MethodAssembler::new();
        asm.load(Op::ILoad, 0);
        asm.return_value(Op::IReturn);
        assert_eq!(asm.finish().unwrap_err(), AssembleError::NoOpenMethod);
    }

    #[test]
    fn stack_underflow_is_reported() {
        let mut asm = MethodAssembler::new();
        let desc = Descriptor::parse("()I").unwrap();
        asm.begin_method(AccessFlags::STATIC, "broken", &desc);
        asm.return_value(Op::IReturn);
        asm.end_method();
        assert_eq!(
            asm.finish().unwrap_err(),
            AssembleError::StackUnderflow {
                method: "broken".into(),
                offset: 0
            }
        );
    }

    #[test]
    fn bad_invoke_descriptor_is_reported() {
        let mut asm = MethodAssembler::new();
        let desc = Descriptor::parse("()V").unwrap();
        asm.begin_method(AccessFlags::STATIC, "m", &desc);
        asm.invoke(Op::InvokeStatic, "a/B", "c", "(I");
        asm.return_value(Op::Return);
        asm.end_method();
        assert!(matches!(asm.finish(), Err(AssembleError::Descriptor(_))));
    }

    #[test]
    fn nested_begin_is_rejected() {
        let mut asm = MethodAssembler::new();
        let desc = Descriptor::parse("()V").unwrap();
        asm.begin_method(AccessFlags::STATIC, "a", &desc);
        asm.begin_method(AccessFlags::STATIC, "b", &desc);
        assert_eq!(
            asm.finish().unwrap_err(),
            AssembleError::MethodAlreadyOpen {
                open: "a".into(),
                requested: "b".into()
            }
        );
    }
}
