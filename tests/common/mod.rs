//! Executes generated assembly on a toy machine so tests can check what a
//! program computes rather than how its text looks.

use std::collections::HashMap;

use keic::CompileOptions;

/// Compile `source` with default options, panicking on any error.
pub fn compile(source: &str) -> String {
  keic::compile(source, &CompileOptions::default())
    .unwrap_or_else(|err| panic!("failed to compile {source:?}: {err}"))
}

/// Compile and run `source`, returning its exit status.
pub fn run(source: &str) -> i64 {
  Machine::default().execute(&compile(source))
}

#[derive(Default)]
pub struct Machine {
  regs: HashMap<String, i64>,
  stack: Vec<i64>,
  zero_flag: bool,
  pub max_depth: usize,
}

impl Machine {
  /// Run until the exit syscall and return the status in `rdi`.
  pub fn execute(&mut self, asm: &str) -> i64 {
    let lines: Vec<&str> = asm
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty() && !line.starts_with(";;") && !line.starts_with("global"))
      .collect();
    let labels: HashMap<&str, usize> = lines
      .iter()
      .enumerate()
      .filter_map(|(i, line)| line.strip_suffix(':').map(|label| (label, i)))
      .collect();

    let mut pc = 0;
    while pc < lines.len() {
      let line = lines[pc];
      pc += 1;
      if line.ends_with(':') {
        continue;
      }
      let (op, rest) = line.split_once(' ').unwrap_or((line, ""));
      let args: Vec<&str> = rest.split(", ").filter(|arg| !arg.is_empty()).collect();
      match op {
        "mov" => {
          let value = self.read(args[1]);
          self.write(args[0], value);
        }
        "push" => {
          let value = self.read(args[0]);
          self.stack.push(value);
          self.max_depth = self.max_depth.max(self.stack.len());
        }
        "pop" => {
          let value = self.stack.pop().expect("pop from empty stack");
          self.write(args[0], value);
        }
        "add" if args[0] == "rsp" => {
          let slots = self.read(args[1]) as usize / 8;
          let len = self.stack.len();
          assert!(slots <= len, "released more slots than pushed");
          self.stack.truncate(len - slots);
        }
        "add" => self.binary(args[0], args[1], i64::wrapping_add),
        "sub" => self.binary(args[0], args[1], i64::wrapping_sub),
        "imul" => self.binary(args[0], args[1], i64::wrapping_mul),
        "cqo" => {}
        "idiv" => {
          let divisor = self.read(args[0]);
          let rax = self.read("rax");
          self.write("rax", rax.wrapping_div(divisor));
          self.write("rdx", rax.wrapping_rem(divisor));
        }
        "test" => {
          let value = self.read(args[0]) & self.read(args[1]);
          self.zero_flag = value == 0;
        }
        "jz" => {
          if self.zero_flag {
            pc = labels[args[0]];
          }
        }
        "jmp" => pc = labels[args[0]],
        "syscall" => {
          assert_eq!(self.read("rax"), 60, "only the exit syscall is supported");
          return self.read("rdi");
        }
        other => panic!("unsupported instruction {other:?} in {line:?}"),
      }
    }
    panic!("program ran past its last instruction");
  }

  /// Current depth of the simulated stack.
  pub fn depth(&self) -> usize {
    self.stack.len()
  }

  fn binary(&mut self, dst: &str, src: &str, f: fn(i64, i64) -> i64) {
    let value = f(self.read(dst), self.read(src));
    self.write(dst, value);
  }

  fn slot(&self, operand: &str) -> Option<usize> {
    let inner = operand
      .trim_start_matches("QWORD ")
      .strip_prefix("[rsp + ")?
      .strip_suffix(']')?;
    let offset: usize = inner.parse().expect("numeric stack offset");
    Some(self.stack.len() - 1 - offset / 8)
  }

  fn read(&self, operand: &str) -> i64 {
    if let Some(slot) = self.slot(operand) {
      return self.stack[slot];
    }
    if let Ok(value) = operand.parse() {
      return value;
    }
    *self
      .regs
      .get(operand)
      .unwrap_or_else(|| panic!("read of unset register {operand}"))
  }

  fn write(&mut self, operand: &str, value: i64) {
    if let Some(slot) = self.slot(operand) {
      self.stack[slot] = value;
    } else {
      self.regs.insert(operand.to_string(), value);
    }
  }
}
