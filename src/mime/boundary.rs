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

use super::lex::is_space;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryMatch {
    /// The line is not a delimiter.
    No,
    /// The line delimits two parts of some active multipart.
    Inner,
    /// The line is the close-delimiter of some active multipart. That
    /// boundary and all boundaries nested within it have been removed.
    Terminal,
}

/// The stack of boundaries of the multiparts currently being parsed, from
/// outermost to innermost.
#[derive(Clone, Debug, Default)]
pub struct Boundaries {
    stack: Vec<Vec<u8>>,
    strict: bool,
}

impl Boundaries {
    pub fn new(strict: bool) -> Self {
        Boundaries {
            stack: Vec::new(),
            strict,
        }
    }

    pub fn push(&mut self, boundary: Vec<u8>) {
        self.stack.push(boundary);
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Forget all boundaries, as happens when the message ends before they
    /// are closed.
    pub fn clear(&mut self) {
        self.stack.clear();
    }

    /// Determine whether `line` is a delimiter for any active boundary.
    ///
    /// Boundaries are tested outermost first. If the line closes a boundary,
    /// that boundary and everything nested inside it is popped.
    ///
    /// Unless strict, a boundary followed by something other than whitespace
    /// is not considered a match, so that a boundary which is a prefix of
    /// another is not confused with it.
    pub fn check(&mut self, line: &[u8]) -> BoundaryMatch {
        if !line.starts_with(b"--") {
            return BoundaryMatch::No;
        }

        let rest = &line[2..];
        for ix in 0..self.stack.len() {
            let boundary = &self.stack[ix];
            let len = boundary.len();
            if !rest.starts_with(boundary) {
                continue;
            }

            if rest[len..].starts_with(b"--") {
                self.stack.truncate(ix);
                return BoundaryMatch::Terminal;
            }

            if !self.strict && rest.len() > len + 1 && !is_space(rest[len]) {
                continue;
            }

            return BoundaryMatch::Inner;
        }

        BoundaryMatch::No
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn stack(strict: bool, boundaries: &[&str]) -> Boundaries {
        let mut b = Boundaries::new(strict);
        for &boundary in boundaries {
            b.push(boundary.as_bytes().to_vec());
        }
        b
    }

    #[test]
    fn inner_and_terminal() {
        let mut b = stack(false, &["outer", "inner"]);
        assert_eq!(BoundaryMatch::No, b.check(b"inner\r\n"));
        assert_eq!(BoundaryMatch::No, b.check(b"-inner\r\n"));
        assert_eq!(BoundaryMatch::Inner, b.check(b"--inner\r\n"));
        assert_eq!(BoundaryMatch::Inner, b.check(b"--inner  \r\n"));
        assert_eq!(BoundaryMatch::Inner, b.check(b"--inner"));
        assert_eq!(2, b.depth());
        assert_eq!(BoundaryMatch::Terminal, b.check(b"--inner--\r\n"));
        assert_eq!(1, b.depth());
        assert_eq!(BoundaryMatch::No, b.check(b"--inner\r\n"));
        assert_eq!(BoundaryMatch::Inner, b.check(b"--outer\r\n"));
    }

    #[test]
    fn outer_terminal_pops_everything_nested() {
        let mut b = stack(false, &["a", "b", "c"]);
        assert_eq!(BoundaryMatch::Terminal, b.check(b"--b--\r\n"));
        assert_eq!(1, b.depth());
        assert_eq!(BoundaryMatch::Terminal, b.check(b"--a--"));
        assert_eq!(0, b.depth());
    }

    #[test]
    fn prefix_boundaries() {
        let mut lenient = stack(false, &["foo", "foobar"]);
        assert_eq!(BoundaryMatch::Inner, lenient.check(b"--foobar\r\n"));
        assert_eq!(2, lenient.depth());
        // A single trailing byte is still accepted
        assert_eq!(BoundaryMatch::Inner, lenient.check(b"--foox"));

        let mut strict = stack(true, &["foo", "foobar"]);
        assert_eq!(BoundaryMatch::Inner, strict.check(b"--foobar\r\n"));
        assert_eq!(BoundaryMatch::Terminal, strict.check(b"--foo--bar\r\n"));
        assert_eq!(0, strict.depth());
    }
}
