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

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Message contains NUL characters")]
    MessageContainsNull,
    #[error("Message contains bare newlines")]
    MessageContainsBareNewline,
    #[error("Message contains 8-bit characters in headers")]
    MessageContains8Bit,
    #[error("Message has an invalid header")]
    BadHeader,
    #[error("Unexpected end of file while reading message")]
    UnexpectedEof,
    #[error("Message is too large to index")]
    MessageTooLarge,
    #[error("Body part exceeds size of message file")]
    PartOutOfRange,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Ssl(#[from] openssl::error::ErrorStack),
    #[error(transparent)]
    Config(#[from] toml::de::Error),
}
