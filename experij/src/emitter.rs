use bytecode::{AccessFlags, Op, ValueKind};
use descriptor::Param;

use crate::error::ExperimentError;
use crate::experiment::ExperimentSet;
use crate::settings::EmitterSettings;
use crate::sink::CodeSink;
use crate::strings::confirm_safe;

/// Descriptor of the shared reference equality routine.
pub const EQUALITY_DESCRIPTOR: &str = "(Ljava/lang/Object;Ljava/lang/Object;)Z";

/// Descriptor of the reporting routine: outcome, experiment, method.
pub const REPORT_DESCRIPTOR: &str = "(ZLjava/lang/String;Ljava/lang/String;)V";

/// How an experiment's result is compared with the control's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqualityDispatch {
    /// Inline comparison of two primitives.
    Primitive(ValueKind),
    /// Static call to the shared `(Object, Object) -> boolean` routine.
    /// Arrays of any depth and element type land here too.
    Reference,
    /// `void` results: nothing to compare.
    Skip,
}

impl EqualityDispatch {
    pub fn for_return(param: &Param) -> Self {
        let tag = param.tag();
        match tag.value_kind() {
            Some(kind) if tag.is_primitive() => EqualityDispatch::Primitive(kind),
            _ if tag.is_reference() => EqualityDispatch::Reference,
            _ => EqualityDispatch::Skip,
        }
    }
}

/// The local the control's result is parked in.
#[derive(Debug, Clone, Copy)]
struct ResultSlot {
    slot: u16,
    store: Op,
    load: Op,
}

/// Every opcode an emitted method needs, resolved before anything reaches
/// the sink.
#[derive(Debug)]
struct Frame {
    loads: Vec<(Op, u16)>,
    result: Option<ResultSlot>,
    dispatch: EqualityDispatch,
    return_op: Op,
}

impl Frame {
    fn load_arguments(&self, sink: &mut impl CodeSink) {
        for &(op, slot) in &self.loads {
            sink.load(op, slot);
        }
    }
}

/// Writes the synthetic entry point of an [`ExperimentSet`].
///
/// The entry point runs the control, then every experiment in registration
/// order with the same arguments, compares each experiment's result with
/// the control's and hands the outcome to the reporting routine. It returns
/// the control's result.
pub struct EntryPointEmitter<'a> {
    set: &'a ExperimentSet,
    settings: &'a EmitterSettings,
}

impl<'a> EntryPointEmitter<'a> {
    pub fn new(set: &'a ExperimentSet, settings: &'a EmitterSettings) -> Self {
        Self { set, settings }
    }

    pub fn entry_point_name(&self) -> String {
        self.set.entry_point_name(self.settings)
    }

    fn invalid(&self, source: descriptor::InvalidOperation) -> ExperimentError {
        ExperimentError::InvalidOperation {
            experiment: self.set.name().to_owned(),
            source,
        }
    }

    fn frame(&self) -> Result<Frame, ExperimentError> {
        let set = self.set;
        set.check_names(self.settings)?;
        let desc = set.descriptor();

        let mut loads = Vec::with_capacity(desc.parameter_count() + 1);
        if !set.is_static() {
            loads.push((Op::ALoad, 0));
        }
        for param in desc.parameters() {
            let op = param.load_op().map_err(|e| self.invalid(e))?;
            loads.push((op, set.local_of(param)));
        }

        let ret = desc.return_param();
        let result = if ret.is_void() {
            None
        } else {
            Some(ResultSlot {
                slot: set.first_free_slot(),
                store: ret.store_op().map_err(|e| self.invalid(e))?,
                load: ret.load_op().map_err(|e| self.invalid(e))?,
            })
        };

        Ok(Frame {
            loads,
            result,
            dispatch: EqualityDispatch::for_return(ret),
            return_op: ret.return_op(),
        })
    }

    /// Emit the entry point method.
    ///
    /// Fails before touching the sink if a generated name is unusable or
    /// the descriptor has a type that cannot be moved where the method
    /// needs it.
    pub fn emit(&self, sink: &mut impl CodeSink) -> Result<(), ExperimentError> {
        let set = self.set;
        let frame = self.frame()?;
        let entry = self.entry_point_name();
        let desc = set.descriptor();
        let invoke = set.invocation_op();

        if frame.dispatch == EqualityDispatch::Skip {
            log::warn!(
                "{}: `void` result, experiments will run without comparison",
                set.name()
            );
        }
        log::debug!(
            "{}: emitting {}.{}{} for control `{}` and {} experiment(s)",
            set.name(),
            set.class_name(),
            entry,
            desc,
            set.control(),
            set.len()
        );

        sink.begin_method(set.method_access(), &entry, desc);

        frame.load_arguments(sink);
        let control = set.renamed_method(self.settings, set.control());
        sink.invoke(invoke, set.class_name(), &control, desc.as_str());
        if let Some(result) = frame.result {
            sink.store(result.store, result.slot);
        }

        for experiment in set.experiments() {
            frame.load_arguments(sink);
            let renamed = set.renamed_method(self.settings, experiment);
            sink.invoke(invoke, set.class_name(), &renamed, desc.as_str());

            let Some(result) = frame.result else {
                continue;
            };
            sink.load(result.load, result.slot);
            match frame.dispatch {
                EqualityDispatch::Primitive(kind) => sink.compare(kind),
                EqualityDispatch::Reference => {
                    let equality = &self.settings.equality;
                    sink.invoke(
                        Op::InvokeStatic,
                        &equality.owner,
                        &equality.name,
                        EQUALITY_DESCRIPTOR,
                    );
                }
                EqualityDispatch::Skip => continue,
            }
            self.report(sink, experiment);
        }

        if let Some(result) = frame.result {
            sink.load(result.load, result.slot);
        }
        sink.return_value(frame.return_op);
        sink.end_method();
        Ok(())
    }

    fn report(&self, sink: &mut impl CodeSink, experiment: &str) {
        let reporter = &self.settings.reporter;
        sink.push_string(self.set.name());
        sink.push_string(experiment);
        sink.invoke(
            Op::InvokeStatic,
            &reporter.owner,
            &reporter.name,
            REPORT_DESCRIPTOR,
        );
    }

    /// Emit `method_name` as a method forwarding its arguments to the entry
    /// point and returning its result. This replaces the body of the
    /// control method.
    ///
    /// The static bit of `access` is taken from the experiment set.
    pub fn emit_delegate(
        &self,
        sink: &mut impl CodeSink,
        access: AccessFlags,
        method_name: &str,
    ) -> Result<(), ExperimentError> {
        confirm_safe(method_name)?;
        let set = self.set;
        let frame = self.frame()?;
        let entry = self.entry_point_name();
        let taken = std::iter::once(set.control())
            .chain(set.experiments().iter().map(String::as_str))
            .any(|m| set.renamed_method(self.settings, m) == method_name);
        if taken || entry == method_name {
            return Err(ExperimentError::InvalidName {
                name: method_name.to_owned(),
                reason: "delegate would replace a generated method".into(),
            });
        }
        let access = if set.is_static() {
            access | AccessFlags::STATIC
        } else {
            access.difference(AccessFlags::STATIC)
        };
        let desc = set.descriptor();

        log::debug!("{}: emitting delegate {}", set.name(), method_name);

        sink.begin_method(access, method_name, desc);
        frame.load_arguments(sink);
        sink.invoke(set.invocation_op(), set.class_name(), &entry, desc.as_str());
        sink.return_value(frame.return_op);
        sink.end_method();
        Ok(())
    }
}
