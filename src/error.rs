use std::io;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// Source is unreadable, corrupt, or not a WebP file
        Decode(msg: String) {
            display("Can't decode {}", msg)
            from(err: image::ImageError) -> (err.to_string())
        }
        /// Palette building or frame mapping failed
        Quantize(msg: String) {
            display("Quantization failed: {}", msg)
            from(err: imagequant::Error) -> (err.to_string())
        }
        Encode(msg: String) {
            display("GIF encoding failed: {}", msg)
            from(err: gif::EncodingError) -> (err.to_string())
        }
        Export(msg: String) {
            display("Frame export failed: {}", msg)
            from(err: lodepng::Error) -> (err.to_string())
        }
        /// Only surfaced by `try_parse_color`; `parse_color` falls back to white
        Config(msg: String) {
            display("Invalid color: {}", msg)
        }
        NoFrames {
            display("Found no usable frames to encode")
        }
        WrongSize(msg: String) {
            display("{}", msg)
        }
        Worker(msg: String) {
            display("Worker process failed: {}", msg)
        }
        ThreadSend {
            display("Internal error; worker thread aborted")
        }
        Io(err: io::Error) {
            from()
            display("I/O: {}", err)
            source(err)
        }
    }
}

pub type ConvResult<T, E = Error> = Result<T, E>;
