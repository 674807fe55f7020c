//! The execution driver: compiles (or loads) a program once, then invokes
//! the five event programs around the record-reading loop.

use std::fs;
use std::io::{BufRead, Read};
use std::path::Path;

use tracing::debug;
use zed_codegen::{compile, zbc, CompiledProgram, Event};
use zed_types::{Diagnostic, ErrorKind, SourceFile};
use zed_vm::Vm;

/// Default cap on a single record, in bytes.
pub const DEFAULT_MAX_RECORD_LEN: usize = 1024 * 1024;

/// A program ready to run: five event byte strings, plus the source text
/// when it was compiled rather than loaded (used to resolve diagnostic
/// offsets to line:col).
#[derive(Debug)]
pub struct LoadedProgram {
    pub program: CompiledProgram,
    pub source: Option<SourceFile>,
}

/// A load failure: the diagnostic plus the source (when it got far enough
/// to read it) so the message can carry line:col.
#[derive(Debug)]
pub struct LoadError {
    pub diagnostic: Diagnostic,
    pub source: Option<SourceFile>,
}

impl LoadError {
    pub fn render(&self, path: &Path) -> String {
        match &self.source {
            Some(sf) => self.diagnostic.render(sf),
            None => format!("{}: {}", path.display(), self.diagnostic),
        }
    }
}

/// Read a program file. A `.zbc` extension selects the precompiled
/// bytecode reader; anything else is lexed, parsed and compiled.
pub fn load_program(path: &Path) -> Result<LoadedProgram, LoadError> {
    if path.extension().is_some_and(|e| e == "zbc") {
        debug!(path = %path.display(), "loading precompiled bytecode");
        let mut file = fs::File::open(path).map_err(|e| LoadError {
            diagnostic: Diagnostic::new(ErrorKind::Io, e.to_string(), 0),
            source: None,
        })?;
        let program = zbc::read_zbc(&mut file).map_err(|e| LoadError {
            diagnostic: e.into(),
            source: None,
        })?;
        return Ok(LoadedProgram {
            program,
            source: None,
        });
    }

    debug!(path = %path.display(), "compiling program source");
    let text = fs::read_to_string(path).map_err(|e| LoadError {
        diagnostic: Diagnostic::new(ErrorKind::Io, e.to_string(), 0),
        source: None,
    })?;
    let sf = SourceFile::new(path.display().to_string(), text);
    let ast = zed_parser::parse_source(&sf).map_err(|diagnostic| LoadError {
        diagnostic,
        source: Some(sf.clone()),
    })?;
    let program = compile(&ast).map_err(|e| LoadError {
        diagnostic: e.into(),
        source: Some(sf.clone()),
    })?;
    Ok(LoadedProgram {
        program,
        source: Some(sf),
    })
}

/// The driver: owns the compiled program and the shared VM state for the
/// lifetime of a run.
pub struct Driver {
    program: CompiledProgram,
    source: Option<SourceFile>,
    vm: Vm,
    max_record_len: usize,
    /// Reused across records (grown on demand, capped by
    /// `max_record_len`).
    record: Vec<u8>,
}

impl Driver {
    pub fn new(loaded: LoadedProgram, max_record_len: usize) -> Self {
        Self {
            program: loaded.program,
            source: loaded.source,
            vm: Vm::new(),
            max_record_len,
            record: Vec::new(),
        }
    }

    /// Render a diagnostic against the program source when available.
    pub fn render(&self, diagnostic: &Diagnostic, program_path: &str) -> String {
        match &self.source {
            Some(sf) => diagnostic.render(sf),
            None => format!("{program_path}: {diagnostic}"),
        }
    }

    /// Run the init program (once, before any input).
    pub fn run_init(&mut self) -> Result<(), Diagnostic> {
        self.vm
            .run_event(self.program.event(Event::Init))
            .map_err(Diagnostic::from)
    }

    /// Process one input: run the file program, then the record loop.
    ///
    /// `@irs` and `@ics` are re-read every record, so a program may switch
    /// separators mid-stream.
    pub fn process_reader(
        &mut self,
        name: &str,
        mut reader: impl BufRead,
    ) -> Result<(), Diagnostic> {
        debug!(file = name, "processing input");
        self.vm.globals.file = name.to_string();
        self.vm.globals.frnum = 1;
        self.vm
            .run_event(self.program.event(Event::File))
            .map_err(Diagnostic::from)?;

        loop {
            let irs = self.vm.globals.irs;
            self.record.clear();
            let mut limited = reader.by_ref().take(self.max_record_len as u64 + 1);
            let n = limited
                .read_until(irs, &mut self.record)
                .map_err(|e| Diagnostic::new(ErrorKind::Io, e.to_string(), 0))?;
            if n == 0 {
                break;
            }
            if self.record.last() == Some(&irs) {
                self.record.pop();
            } else if self.record.len() > self.max_record_len {
                return Err(Diagnostic::new(
                    ErrorKind::RecordTooLong,
                    format!("record exceeds {} bytes", self.max_record_len),
                    0,
                ));
            }

            self.vm.globals.rec = String::from_utf8_lossy(&self.record).into_owned();
            let out_before = self.vm.out.len();

            self.vm
                .run_event(self.program.event(Event::Rec))
                .map_err(Diagnostic::from)?;

            // Split the (possibly rewritten) record into columns.
            let ics = self.vm.globals.ics as char;
            let cols: Vec<String> = self
                .vm
                .globals
                .rec
                .split(ics)
                .map(str::to_string)
                .collect();
            self.vm.globals.set_cols(cols);

            self.vm
                .run_event(self.program.event(Event::Rules))
                .map_err(Diagnostic::from)?;

            if self.vm.out.len() > out_before {
                let ors = self.vm.globals.ors;
                self.vm.out.push(ors);
            }
            self.vm.globals.rnum += 1;
            self.vm.globals.frnum += 1;
        }
        Ok(())
    }

    /// Run the exit program and hand back the buffered output.
    pub fn finish(&mut self) -> Result<Vec<u8>, Diagnostic> {
        self.vm
            .run_event(self.program.event(Event::Exit))
            .map_err(Diagnostic::from)?;
        Ok(std::mem::take(&mut self.vm.out))
    }
}
