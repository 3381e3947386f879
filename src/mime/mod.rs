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

//! Parsing RFC 822 and MIME messages into a tree of body parts, and encoding
//! that tree into cache records.

pub mod address;
pub mod boundary;
pub mod cache;
pub mod charset;
pub mod date;
pub mod encoded_word;
pub mod grovel;
pub mod header;
pub mod lex;
pub mod model;
pub mod params;
pub mod quoted_printable;
pub mod strict;
