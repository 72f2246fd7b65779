//! Indexed, push/pop access to a live [`Debugger`]'s guest stack.

use quarry_arch::Addr;

use crate::debugger::Debugger;
use crate::error::DbgError;

/// A live view onto a [`Debugger`]'s guest stack.
///
/// Indexing is in words relative to the current stack pointer: `stack[0]`
/// is the word at `sp`, `stack[1]` the next word up, and so on, matching
/// the source project's `stack[i]` convention. Growth direction (down) is
/// assumed, as on every architecture this toolkit targets.
pub struct Stack<'a, D> {
    debugger: &'a mut D,
}

impl<'a, D: Debugger> Stack<'a, D> {
    pub(crate) fn new(debugger: &'a mut D) -> Self {
        Self { debugger }
    }

    fn word_size(&self) -> u64 {
        u64::from(self.debugger.arch().bits()) / 8
    }

    fn address_of(&self, index: i64) -> Result<Addr, DbgError> {
        let sp = self.debugger.sp()?;
        let offset = index.wrapping_mul(self.word_size() as i64);
        Ok(sp.wrapping_add_signed(offset))
    }

    /// Reads the word at `sp + index * word_size`.
    ///
    /// # Errors
    ///
    /// As the underlying memory access.
    pub fn get(&self, index: i64) -> Result<u64, DbgError> {
        let addr = self.address_of(index)?;
        self.debugger.read_word(addr)
    }

    /// Writes the word at `sp + index * word_size`.
    ///
    /// # Errors
    ///
    /// As the underlying memory access.
    pub fn set(&mut self, index: i64, value: u64) -> Result<(), DbgError> {
        let addr = self.address_of(index)?;
        self.debugger.write_word(addr, value)
    }

    /// Decrements `sp` by one word, then writes `value` at the new top.
    ///
    /// # Errors
    ///
    /// As the underlying memory access.
    pub fn push(&mut self, value: u64) -> Result<(), DbgError> {
        let word_size = self.word_size();
        let new_sp = self.debugger.sp()?.wrapping_sub(word_size);
        self.debugger.set_sp(new_sp)?;
        self.debugger.write_word(new_sp, value)
    }

    /// Reads the word at the current top of stack, then increments `sp` by
    /// one word.
    ///
    /// # Errors
    ///
    /// As the underlying memory access.
    pub fn pop(&mut self) -> Result<u64, DbgError> {
        let sp = self.debugger.sp()?;
        let value = self.debugger.read_word(sp)?;
        self.debugger.set_sp(sp.wrapping_add(self.word_size()))?;
        Ok(value)
    }
}
