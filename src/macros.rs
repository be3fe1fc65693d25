/// Emite una instrucción de ensamblador, con operandos alineados.
macro_rules! emit {
    ($output:expr, $opcode:expr) => {
        writeln!($output, "\t{}", $opcode)
    };

    ($output:expr, $opcode:expr, $($format:tt)*) => {{
        write!($output, "\t{:16}", $opcode)?;
        writeln!($output, $($format)*)
    }};
}
