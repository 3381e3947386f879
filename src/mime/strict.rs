//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Crymap.
//
// Crymap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Crymap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Crymap. If not, see <http://www.gnu.org/licenses/>.

//! Copying a message in while enforcing minimal RFC 822 compliance.

use std::io::{Read, Write};

use log::error;

use crate::support::error::Error;
use crate::support::system_config::EightBitPolicy;

const CHUNK_SIZE: usize = 4096;

/// Copy exactly `size` bytes from `src` to `dst`, validating them on the way.
///
/// The whole input is always consumed and written (with 8-bit header bytes
/// replaced by `X` under `EightBitPolicy::Munge`) before any validation
/// failure is reported; only the first failure is reported.
///
/// - NUL is never allowed in the header block, and is allowed in the body
///   only if `allow_null`.
/// - LF must be preceded by CR in the header block, and in the body too
///   unless `allow_null`.
/// - Header lines must start with a field name: no leading `:`, and nothing
///   at or below space before the colon. An mbox-style `From ` line is
///   tolerated.
/// - Input which ends in the middle of a header line is rejected.
pub fn copy_strict(
    mut src: impl Read,
    mut dst: impl Write,
    size: u64,
    allow_null: bool,
    eight_bit: EightBitPolicy,
) -> Result<(), Error> {
    let mut validator = Validator::new(allow_null, eight_bit);
    let mut buf = [0u8; CHUNK_SIZE];
    let mut remaining = size;

    while remaining > 0 {
        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        let n = src.read(&mut buf[..want])?;
        if 0 == n {
            error!("Unexpected end of file with {} bytes to go", remaining);
            return Err(Error::UnexpectedEof);
        }

        remaining -= n as u64;
        validator.scan(&mut buf[..n]);
        dst.write_all(&buf[..n])?;
    }

    dst.flush()?;
    validator.finish()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LineState {
    /// At the first byte of a header line.
    Start,
    /// Within the field name of a header line. The value is how many leading
    /// bytes of the line matched `From `.
    Name(usize),
    /// Anywhere else.
    Rest,
}

struct Validator {
    allow_null: bool,
    eight_bit: EightBitPolicy,
    in_header: bool,
    blank_line: bool,
    saw_cr: bool,
    line: LineState,
    error: Option<Error>,
    bad_header: bool,
}

impl Validator {
    fn new(allow_null: bool, eight_bit: EightBitPolicy) -> Self {
        Validator {
            allow_null,
            eight_bit,
            in_header: true,
            blank_line: true,
            saw_cr: false,
            line: LineState::Start,
            error: None,
            bad_header: false,
        }
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn scan(&mut self, chunk: &mut [u8]) {
        for b in chunk {
            if self.in_header {
                self.check_header_line(*b);
            }

            match *b {
                0 if self.in_header || !self.allow_null => {
                    self.fail(Error::MessageContainsNull);
                    self.saw_cr = false;
                    self.blank_line = false;
                }

                b'\n' => {
                    if !self.saw_cr && (self.in_header || !self.allow_null) {
                        self.fail(Error::MessageContainsBareNewline);
                    }
                    self.saw_cr = false;
                    if self.blank_line {
                        self.in_header = false;
                    }
                    self.blank_line = true;
                    self.line = LineState::Start;
                }

                b'\r' => self.saw_cr = true,

                _ => {
                    self.saw_cr = false;
                    self.blank_line = false;
                    if self.in_header && *b >= 0x80 {
                        match self.eight_bit {
                            EightBitPolicy::Reject => {
                                self.fail(Error::MessageContains8Bit)
                            }
                            EightBitPolicy::Munge => *b = b'X',
                            EightBitPolicy::Allow => (),
                        }
                    }
                }
            }
        }
    }

    fn check_header_line(&mut self, b: u8) {
        self.line = match self.line {
            LineState::Start => match b {
                // Continuation lines and the blank line ending the headers
                b' ' | b'\t' | b'\r' => LineState::Rest,
                b':' => {
                    self.bad_header = true;
                    LineState::Rest
                }
                _ => self.name_byte(0, b),
            },
            LineState::Name(matched) => self.name_byte(matched, b),
            LineState::Rest => LineState::Rest,
        };
    }

    fn name_byte(&mut self, matched: usize, b: u8) -> LineState {
        const FROM: &[u8] = b"From ";

        if b':' == b {
            LineState::Rest
        } else if FROM.len() - 1 == matched && b' ' == b {
            LineState::Rest
        } else if b <= b' ' {
            self.bad_header = true;
            LineState::Rest
        } else if matched < FROM.len() && FROM[matched] == b {
            LineState::Name(matched + 1)
        } else {
            LineState::Name(FROM.len())
        }
    }

    fn finish(self) -> Result<(), Error> {
        if let Some(error) = self.error {
            return Err(error);
        }

        // Input ending part way through a header line
        if self.bad_header || (self.in_header && LineState::Start != self.line)
        {
            return Err(Error::BadHeader);
        }

        Ok(())
    }
}
