//! Orchestrates the interpreter end to end: resolves the source/input file
//! arguments (falling back to standard input for whichever one is absent),
//! loads the program through [`ippxml::load`], runs it through
//! [`ippcore::executor::Executor`], and maps whatever happens to the process
//! exit code documented in [`ippcore::error::Error::exit_code`].

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

use log::{debug, error};

use ippcore::executor::Executor;

/// Opens `path` for reading, or falls back to standard input when `path` is
/// `None`. Any failure to open is reported as exit code 11 (the CLI's
/// "file does not exist or is not readable" bucket).
fn open_reader(flag: &str, path: Option<&str>) -> Result<Box<dyn BufRead>, i32> {
    match path {
        None => Ok(Box::new(BufReader::new(io::stdin()))),
        Some(p) => match File::open(p) {
            Ok(file) => {
                if let Ok(canon) = std::fs::canonicalize(p) {
                    debug!("--{}={} resolved to {}", flag, p, canon.display());
                }
                Ok(Box::new(BufReader::new(file)))
            }
            Err(e) => {
                let reason = if e.kind() == io::ErrorKind::NotFound {
                    "does not exist"
                } else {
                    "is not readable"
                };
                error!("--{} file \"{}\" {}: {}", flag, p, reason, e);
                Err(11)
            }
        },
    }
}

/// Runs the whole pipeline and returns the process exit code. `source` is
/// the `--source` path, `input` the `--input` path; either may be absent,
/// but at least one must be present (enforced by the CLI argument parser
/// before this is called).
pub fn drive(source: Option<&str>, input: Option<&str>) -> i32 {
    let source_reader = match open_reader("source", source) {
        Ok(reader) => reader,
        Err(code) => return code,
    };
    let input_reader = match open_reader("input", input) {
        Ok(reader) => reader,
        Err(code) => return code,
    };

    let program = match ippxml::load(source_reader) {
        Ok(program) => program,
        Err(err) => {
            error!("{}", err);
            return err.exit_code();
        }
    };
    debug!("program loaded, {} instructions", program.len());

    let stdout = io::stdout();
    let mut executor = Executor::new(program, input_reader, stdout.lock());
    let result = executor.run();

    if let Err(e) = executor.into_output().flush() {
        error!("failed to flush standard output: {}", e);
        return 99;
    }

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            err.exit_code()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Writes `contents` to a uniquely named file under the OS temp dir and
    /// returns its path; the caller is responsible for removing it.
    fn write_temp_file(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_str().unwrap().to_owned()
    }

    #[test]
    fn missing_source_file_exits_11() {
        let code = drive(Some("/nonexistent/ippvm-test-source.xml"), Some("/dev/null"));
        assert_eq!(code, 11);
    }

    #[test]
    fn malformed_xml_source_exits_31() {
        let path = write_temp_file("ippvm-test-malformed.xml", "<program language=\"IPPcode22\">");
        let code = drive(Some(&path), Some("/dev/null"));
        std::fs::remove_file(&path).unwrap();
        assert_eq!(code, 31);
    }

    #[test]
    fn exit_instruction_short_circuits_with_its_own_code() {
        let path = write_temp_file(
            "ippvm-test-exit.xml",
            r#"<program language="IPPcode22">
  <instruction order="1" opcode="EXIT"><arg1 type="int">21</arg1></instruction>
</program>"#,
        );
        let code = drive(Some(&path), None);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(code, 21);
    }
}
