// Business logic services layer
//
// Pure logic shared by the import pipeline and the `inspect` command.

pub mod matching;
