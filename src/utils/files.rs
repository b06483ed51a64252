use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt, AsyncWriteExt, Lines},
};

/// Read a file from the given path into a list of strings
pub async fn read_file(path: &str) -> io::Result<Vec<String>> {
    let mut r = file_reader(path).await?;
    let mut lines = Vec::new();

    while let Some(line) = r.next_line().await? {
        lines.push(line);
    }

    Ok(lines)
}

/// Write a list of strings to the given path, one per line
pub async fn write_lines<S: AsRef<str>>(path: &str, lines: &[S]) -> io::Result<()> {
    let mut w = io::BufWriter::new(File::create(path).await?);

    for line in lines {
        w.write_all(line.as_ref().as_bytes()).await?;
        w.write_all(b"\n").await?;
    }

    w.flush().await
}

async fn file_reader(path: &str) -> io::Result<Lines<io::BufReader<File>>> {
    let f = File::open(path).await?;

    Ok(io::BufReader::new(f).lines())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn lines_survive_a_write_and_read() {
        let path = std::env::temp_dir().join(format!("burn-nmt-files-{}.txt", std::process::id()));
        let path = path.to_string_lossy().to_string();

        write_lines(&path, &["hallo wêreld", "", "tot siens"])
            .await
            .unwrap();

        let lines = read_file(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(lines, vec!["hallo wêreld", "", "tot siens"]);
    }

    #[tokio::test]
    async fn missing_files_are_errors() {
        assert!(read_file("/definitely/not/here.txt").await.is_err());
    }
}
